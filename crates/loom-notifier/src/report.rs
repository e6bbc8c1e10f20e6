// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assembly of error and session payloads.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

use chrono::SecondsFormat;
use loom_notifier_core::{
	App, DiagnosticContext, ErrorReport, Event, NotifierInfo, PayloadBreadcrumb, Session,
	SessionCounts, SessionReport, ERROR_PAYLOAD_VERSION,
};

use crate::chain::ChainWalker;
use crate::config::Configuration;
use crate::runtime::RuntimeMetadata;
use crate::sessions::SessionTracker;
use crate::{NOTIFIER_NAME, NOTIFIER_URL, NOTIFIER_VERSION};

/// Builds payloads for one notifier.
pub struct ReportAssembler {
	api_key: String,
	app: App,
	runtime: RuntimeMetadata,
	started: Instant,
	walker: ChainWalker,
}

impl ReportAssembler {
	pub fn new(config: &Configuration) -> Self {
		Self {
			api_key: config.api_key.clone(),
			app: App {
				id: config.app_id.clone(),
				version: Some(config.app_version.clone()),
				release_stage: Some(config.release_stage.clone()),
				app_type: config.app_type.clone(),
				duration: 0,
			},
			runtime: config.runtime_metadata.clone(),
			started: Instant::now(),
			walker: ChainWalker::default(),
		}
	}

	/// Identifies this library in every payload.
	pub fn notifier_info() -> NotifierInfo {
		NotifierInfo {
			name: NOTIFIER_NAME.to_string(),
			version: NOTIFIER_VERSION.to_string(),
			url: NOTIFIER_URL.to_string(),
		}
	}

	/// App section with the time elapsed since the notifier was built.
	pub fn app(&self) -> App {
		App {
			duration: i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX),
			..self.app.clone()
		}
	}

	/// Builds the report for `err` raised under `ctx`.
	///
	/// Counts the event against the session of the merged context.
	pub fn assemble(&self, ctx: &DiagnosticContext, err: &(dyn StdError + 'static)) -> ErrorReport {
		let agg = self.walker.aggregate(ctx, err);
		let session = SessionTracker::record_event(&agg.context, agg.unhandled);

		let event = Event {
			payload_version: ERROR_PAYLOAD_VERSION.to_string(),
			context: agg.context.label().map(str::to_string),
			unhandled: agg.unhandled,
			severity: agg.severity,
			severity_reason: agg.severity_reason.into(),
			exceptions: agg.exceptions,
			breadcrumbs: agg
				.context
				.breadcrumbs()
				.iter()
				.map(PayloadBreadcrumb::from)
				.collect(),
			request: None,
			user: agg.context.user().cloned(),
			app: self.app(),
			device: self.runtime.device(),
			session,
			metadata: agg.context.metadata().clone(),
			grouping_hash: None,
		};

		ErrorReport {
			api_key: self.api_key.clone(),
			notifier: Self::notifier_info(),
			events: vec![event],
		}
	}

	/// Builds one batch report for `sessions`, or `None` if there are none.
	pub fn session_report(&self, sessions: &[Arc<Session>]) -> Option<SessionReport> {
		let first = sessions.first()?;
		Some(SessionReport {
			notifier: Self::notifier_info(),
			app: self.app(),
			device: self.runtime.device(),
			session_counts: vec![SessionCounts {
				started_at: first.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
				sessions_started: sessions.len(),
			}],
		})
	}
}
