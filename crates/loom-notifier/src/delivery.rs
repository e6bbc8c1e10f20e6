// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of payloads to the collector.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use loom_notifier_core::{ErrorReport, SessionReport, ERROR_PAYLOAD_VERSION, SESSION_PAYLOAD_VERSION};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Configuration;
use crate::error::{NotifierError, Result};
use crate::http;

pub const HEADER_API_KEY: &str = "Bugsnag-Api-Key";
pub const HEADER_PAYLOAD_VERSION: &str = "Bugsnag-Payload-Version";
pub const HEADER_SENT_AT: &str = "Bugsnag-Sent-At";

/// Sends payloads to the collector. Failures are returned, never retried.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Send one error report to the notify endpoint.
	async fn send_report(&self, report: &ErrorReport) -> Result<()>;

	/// Send one session batch to the sessions endpoint.
	async fn send_sessions(&self, report: &SessionReport) -> Result<()>;
}

/// [`Transport`] over HTTPS using the notifier's own client.
///
/// The request timeout comes from the configuration; no caller deadline
/// ever applies to a delivery.
pub struct HttpTransport {
	client: Client,
	api_key: String,
	notify_endpoint: Url,
	sessions_endpoint: Url,
}

impl HttpTransport {
	pub fn new(config: &Configuration) -> Result<Self> {
		Ok(Self {
			client: http::new_client_with_timeout(config.request_timeout)?,
			api_key: config.api_key.clone(),
			notify_endpoint: config.notify_endpoint.clone(),
			sessions_endpoint: config.sessions_endpoint.clone(),
		})
	}

	async fn post(&self, url: &Url, payload_version: &str, body: Vec<u8>) -> Result<()> {
		debug!(url = %url, bytes = body.len(), payload_version, "Posting payload");

		let response = self
			.client
			.post(url.clone())
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.header(HEADER_API_KEY, &self.api_key)
			.header(HEADER_PAYLOAD_VERSION, payload_version)
			.header(HEADER_SENT_AT, sent_at())
			.body(body)
			.send()
			.await?;

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(NotifierError::ServerError { status, message });
		}

		Ok(())
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send_report(&self, report: &ErrorReport) -> Result<()> {
		let body = serde_json::to_vec(report)?;
		self.post(&self.notify_endpoint, ERROR_PAYLOAD_VERSION, body).await
	}

	async fn send_sessions(&self, report: &SessionReport) -> Result<()> {
		let body = serde_json::to_vec(report)?;
		self
			.post(&self.sessions_endpoint, SESSION_PAYLOAD_VERSION, body)
			.await
	}
}

/// Current time as RFC 3339 UTC with second precision.
fn sent_at() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
