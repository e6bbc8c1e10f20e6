// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notifier configuration, hooks and the builder that validates them.

use std::sync::Arc;
use std::time::Duration;

use loom_notifier_core::{ErrorReport, SessionReport};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::Url;

use crate::client::Notifier;
use crate::error::{BoxError, NotifierError, Result};
use crate::runtime::RuntimeMetadata;

pub const DEFAULT_NOTIFY_ENDPOINT: &str = "https://notify.bugsnag.com";
pub const DEFAULT_SESSIONS_ENDPOINT: &str = "https://sessions.bugsnag.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SESSION_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);
/// Capacity of each of the worker's queues.
pub const QUEUE_CAPACITY: usize = 16;

static API_KEY_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("api key pattern is invalid"));

static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r"^v?\d+(\.\d+)?(\.\d+)?(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
	)
	.expect("semver pattern is invalid")
});

/// Inspects or rewrites an error report before it is queued. Returning an
/// error vetoes the report.
pub type ErrorReportSanitizer =
	Arc<dyn Fn(&mut ErrorReport) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Inspects or rewrites a session report before it is sent. Returning an
/// error vetoes the report.
pub type SessionReportSanitizer =
	Arc<dyn Fn(&mut SessionReport) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Receives every error the notifier cannot return to a caller.
pub type InternalErrorCallback = Arc<dyn Fn(&NotifierError) + Send + Sync>;

/// Routes internal errors to the log and the configured callback.
#[derive(Clone, Default)]
pub(crate) struct ErrorSink {
	callback: Option<InternalErrorCallback>,
}

impl ErrorSink {
	pub(crate) fn new(callback: Option<InternalErrorCallback>) -> Self {
		Self { callback }
	}

	pub(crate) fn report(&self, err: NotifierError) {
		warn!(error = %err, "Notifier internal error");
		if let Some(callback) = &self.callback {
			callback(&err);
		}
	}
}

/// Validated notifier configuration.
#[derive(Clone)]
pub struct Configuration {
	pub api_key: String,
	pub app_version: String,
	pub release_stage: String,
	pub app_id: Option<String>,
	pub app_type: Option<String>,
	pub notify_endpoint: Url,
	pub sessions_endpoint: Url,
	/// Crate name whose frames are marked in project.
	pub project_module: String,
	pub request_timeout: Duration,
	pub session_publish_interval: Duration,
	pub error_report_sanitizer: Option<ErrorReportSanitizer>,
	pub session_report_sanitizer: Option<SessionReportSanitizer>,
	pub internal_error_callback: Option<InternalErrorCallback>,
	pub runtime_metadata: RuntimeMetadata,
}

impl std::fmt::Debug for Configuration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Configuration")
			.field("api_key", &"[REDACTED]")
			.field("app_version", &self.app_version)
			.field("release_stage", &self.release_stage)
			.field("app_id", &self.app_id)
			.field("app_type", &self.app_type)
			.field("notify_endpoint", &self.notify_endpoint.as_str())
			.field("sessions_endpoint", &self.sessions_endpoint.as_str())
			.field("project_module", &self.project_module)
			.field("request_timeout", &self.request_timeout)
			.field("session_publish_interval", &self.session_publish_interval)
			.field("runtime_metadata", &self.runtime_metadata)
			.finish_non_exhaustive()
	}
}

impl Configuration {
	/// Starts a builder from `BUGSNAG_*` environment variables.
	///
	/// Reads `BUGSNAG_API_KEY`, `BUGSNAG_APP_VERSION`,
	/// `BUGSNAG_RELEASE_STAGE`, `BUGSNAG_NOTIFY_ENDPOINT` and
	/// `BUGSNAG_SESSIONS_ENDPOINT`. Unset variables leave the builder unset.
	pub fn from_env() -> NotifierBuilder {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NotifierBuilder {
		let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
		NotifierBuilder {
			api_key: get("BUGSNAG_API_KEY"),
			app_version: get("BUGSNAG_APP_VERSION"),
			release_stage: get("BUGSNAG_RELEASE_STAGE"),
			notify_endpoint: get("BUGSNAG_NOTIFY_ENDPOINT"),
			sessions_endpoint: get("BUGSNAG_SESSIONS_ENDPOINT"),
			..NotifierBuilder::new()
		}
	}
}

/// Builder for constructing a [`Notifier`].
///
/// # Example
///
/// ```ignore
/// let notifier = Notifier::builder()
///     .api_key("0123456789abcdef0123456789abcdef")
///     .app_version(env!("CARGO_PKG_VERSION"))
///     .release_stage("production")
///     .project_module("my_app")
///     .build()?;
/// ```
pub struct NotifierBuilder {
	api_key: Option<String>,
	app_version: Option<String>,
	release_stage: Option<String>,
	app_id: Option<String>,
	app_type: Option<String>,
	notify_endpoint: Option<String>,
	sessions_endpoint: Option<String>,
	project_module: Option<String>,
	request_timeout: Duration,
	session_publish_interval: Duration,
	error_report_sanitizer: Option<ErrorReportSanitizer>,
	session_report_sanitizer: Option<SessionReportSanitizer>,
	internal_error_callback: Option<InternalErrorCallback>,
	runtime_metadata: Option<RuntimeMetadata>,
}

impl NotifierBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			app_version: None,
			release_stage: None,
			app_id: None,
			app_type: None,
			notify_endpoint: None,
			sessions_endpoint: None,
			project_module: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			session_publish_interval: DEFAULT_SESSION_PUBLISH_INTERVAL,
			error_report_sanitizer: None,
			session_report_sanitizer: None,
			internal_error_callback: None,
			runtime_metadata: None,
		}
	}

	/// Sets the project API key (32 lowercase hex characters).
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Sets the application version (semver, e.g. `1.2.3` or `v2.0.0-rc.1`).
	pub fn app_version(mut self, version: impl Into<String>) -> Self {
		self.app_version = Some(version.into());
		self
	}

	/// Sets the release stage, e.g. `production` or `staging`.
	pub fn release_stage(mut self, stage: impl Into<String>) -> Self {
		self.release_stage = Some(stage.into());
		self
	}

	/// Sets the application identifier, e.g. a bundle or package name.
	pub fn app_id(mut self, id: impl Into<String>) -> Self {
		self.app_id = Some(id.into());
		self
	}

	/// Sets the component type, e.g. `worker` or `web`.
	pub fn app_type(mut self, app_type: impl Into<String>) -> Self {
		self.app_type = Some(app_type.into());
		self
	}

	/// Sets the error report endpoint. Requires `sessions_endpoint` too.
	pub fn notify_endpoint(mut self, url: impl Into<String>) -> Self {
		self.notify_endpoint = Some(url.into());
		self
	}

	/// Sets the session report endpoint. Requires `notify_endpoint` too.
	pub fn sessions_endpoint(mut self, url: impl Into<String>) -> Self {
		self.sessions_endpoint = Some(url.into());
		self
	}

	/// Sets the crate whose frames are marked in project by
	/// [`Notifier::wrap`].
	///
	/// Errors wrapped with the `wrap!` macro always use the calling crate.
	pub fn project_module(mut self, module: impl Into<String>) -> Self {
		self.project_module = Some(module.into());
		self
	}

	/// Sets the HTTP request timeout for deliveries.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Sets how often batched session starts are published.
	pub fn session_publish_interval(mut self, interval: Duration) -> Self {
		self.session_publish_interval = interval;
		self
	}

	/// Sets a hook run on every error report before it is queued.
	///
	/// Runs on the task calling `notify`. Returning an error drops the
	/// report and passes the error to the internal error callback.
	pub fn error_report_sanitizer<F>(mut self, sanitizer: F) -> Self
	where
		F: Fn(&mut ErrorReport) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
	{
		self.error_report_sanitizer = Some(Arc::new(sanitizer));
		self
	}

	/// Sets a hook run on every session batch before it is sent.
	///
	/// Runs on the delivery worker. Returning an error drops the batch.
	pub fn session_report_sanitizer<F>(mut self, sanitizer: F) -> Self
	where
		F: Fn(&mut SessionReport) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
	{
		self.session_report_sanitizer = Some(Arc::new(sanitizer));
		self
	}

	/// Sets the callback for delivery failures, vetoes and misuse.
	pub fn internal_error_callback<F>(mut self, callback: F) -> Self
	where
		F: Fn(&NotifierError) + Send + Sync + 'static,
	{
		self.internal_error_callback = Some(Arc::new(callback));
		self
	}

	/// Overrides the collected host metadata.
	pub fn runtime_metadata(mut self, metadata: RuntimeMetadata) -> Self {
		self.runtime_metadata = Some(metadata);
		self
	}

	/// Validates the settings into a [`Configuration`].
	pub fn into_configuration(self) -> Result<Configuration> {
		let api_key = self.api_key.unwrap_or_default();
		if !API_KEY_RE.is_match(&api_key) {
			return Err(NotifierError::InvalidApiKey(api_key));
		}

		let (notify_endpoint, sessions_endpoint) =
			match (self.notify_endpoint, self.sessions_endpoint) {
				(None, None) => (
					DEFAULT_NOTIFY_ENDPOINT.to_string(),
					DEFAULT_SESSIONS_ENDPOINT.to_string(),
				),
				(Some(notify), Some(sessions)) => (notify, sessions),
				_ => return Err(NotifierError::MismatchedEndpoints),
			};
		let notify_endpoint = parse_endpoint("notify", notify_endpoint)?;
		let sessions_endpoint = parse_endpoint("sessions", sessions_endpoint)?;

		let release_stage = self.release_stage.unwrap_or_default();
		if release_stage.trim().is_empty() {
			return Err(NotifierError::MissingReleaseStage);
		}

		let app_version = self.app_version.unwrap_or_default();
		if !SEMVER_RE.is_match(&app_version) {
			return Err(NotifierError::InvalidAppVersion(app_version));
		}

		Ok(Configuration {
			api_key,
			app_version,
			release_stage,
			app_id: self.app_id,
			app_type: self.app_type,
			notify_endpoint,
			sessions_endpoint,
			project_module: self.project_module.unwrap_or_default(),
			request_timeout: self.request_timeout,
			session_publish_interval: self.session_publish_interval,
			error_report_sanitizer: self.error_report_sanitizer,
			session_report_sanitizer: self.session_report_sanitizer,
			internal_error_callback: self.internal_error_callback,
			runtime_metadata: self.runtime_metadata.unwrap_or_else(RuntimeMetadata::collect),
		})
	}

	/// Validates the configuration and starts the delivery worker.
	///
	/// Must be called from within a tokio runtime.
	pub fn build(self) -> Result<Notifier> {
		Notifier::start(self.into_configuration()?)
	}
}

impl Default for NotifierBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn parse_endpoint(name: &'static str, raw: String) -> Result<Url> {
	match Url::parse(&raw) {
		Ok(url) if url.has_host() && !url.cannot_be_a_base() => Ok(url),
		_ => Err(NotifierError::InvalidEndpoint { name, url: raw }),
	}
}
