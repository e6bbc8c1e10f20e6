// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire payloads sent to the collector.
//!
//! Field names follow the collector's JSON contract (camelCase, `metaData`).
//! Every field is public so sanitizers can inspect and rewrite a payload
//! before it is sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::breadcrumb::Breadcrumb;
use crate::context::{Metadata, User};
use crate::session::{EventCounts, Session};
use crate::severity::{Severity, SeverityReason};

/// Payload version header value for error reports.
pub const ERROR_PAYLOAD_VERSION: &str = "5";
/// Payload version header value for session reports.
pub const SESSION_PAYLOAD_VERSION: &str = "1.0";

/// Identifies the library that produced a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierInfo {
	pub name: String,
	pub version: String,
	pub url: String,
}

/// Application section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub release_stage: Option<String>,
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub app_type: Option<String>,
	/// Milliseconds since the notifier was created.
	#[serde(default)]
	pub duration: i64,
}

/// Device section. Extra metrics are flattened into the object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os_version: Option<String>,
	#[serde(default)]
	pub runtime_versions: BTreeMap<String, String>,
	#[serde(flatten)]
	pub metrics: BTreeMap<String, Value>,
}

/// One error report, as posted to the notify endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
	pub api_key: String,
	pub notifier: NotifierInfo,
	pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub payload_version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<String>,
	pub unhandled: bool,
	pub severity: Severity,
	pub severity_reason: SeverityReasonPayload,
	/// Innermost exception first.
	pub exceptions: Vec<Exception>,
	/// Most recent breadcrumb first.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub breadcrumbs: Vec<PayloadBreadcrumb>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request: Option<Request>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	pub app: App,
	pub device: Device,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session: Option<EventSession>,
	#[serde(rename = "metaData", default, skip_serializing_if = "BTreeMap::is_empty")]
	pub metadata: Metadata,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub grouping_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityReasonPayload {
	#[serde(rename = "type")]
	pub reason_type: SeverityReason,
}

impl From<SeverityReason> for SeverityReasonPayload {
	fn from(reason_type: SeverityReason) -> Self {
		Self { reason_type }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
	pub error_class: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub message: String,
	/// `None` for links in the chain that carry no captured stack.
	pub stacktrace: Option<Vec<StackFrame>>,
}

/// One call-stack entry, innermost first within a stacktrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
	pub file: String,
	pub line_number: u32,
	pub method: String,
	pub in_project: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadBreadcrumb {
	/// RFC 3339, second precision.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub timestamp: String,
	pub name: String,
	#[serde(rename = "type")]
	pub breadcrumb_type: String,
	#[serde(rename = "metaData", default, skip_serializing_if = "Map::is_empty")]
	pub metadata: Map<String, Value>,
}

impl From<&Breadcrumb> for PayloadBreadcrumb {
	fn from(bc: &Breadcrumb) -> Self {
		Self {
			timestamp: bc
				.timestamp
				.map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
				.unwrap_or_default(),
			name: bc.name.clone(),
			breadcrumb_type: bc.breadcrumb_type.to_string(),
			metadata: bc.metadata.clone(),
		}
	}
}

/// HTTP request details. Never filled automatically; sanitizers may add it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_ip: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub http_method: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referer: Option<String>,
}

/// Session linkage on an error event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSession {
	pub id: String,
	pub started_at: String,
	pub events: SessionEvents,
}

impl EventSession {
	pub fn new(session: &Session, counts: EventCounts) -> Self {
		Self {
			id: session.id.to_string(),
			started_at: session
				.started_at
				.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
			events: counts.into(),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEvents {
	#[serde(default, skip_serializing_if = "is_zero")]
	pub handled: u32,
	#[serde(default, skip_serializing_if = "is_zero")]
	pub unhandled: u32,
}

impl From<EventCounts> for SessionEvents {
	fn from(counts: EventCounts) -> Self {
		Self {
			handled: counts.handled,
			unhandled: counts.unhandled,
		}
	}
}

fn is_zero(n: &u32) -> bool {
	*n == 0
}

/// Batched session starts, as posted to the sessions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
	pub notifier: NotifierInfo,
	pub app: App,
	pub device: Device,
	pub session_counts: Vec<SessionCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
	pub started_at: String,
	pub sessions_started: usize,
}
