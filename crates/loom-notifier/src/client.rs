// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notifier client for reporting errors and tracking sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_notifier_core::DiagnosticContext;
use tracing::{debug, info};

use crate::config::{Configuration, ErrorSink, NotifierBuilder};
use crate::delivery::{HttpTransport, Transport};
use crate::dispatcher::Dispatcher;
use crate::error::{BoxError, NotifierError, Result};
use crate::report::ReportAssembler;
use crate::sessions::SessionTracker;
use crate::wrap::Error;

/// Internal client state.
struct NotifierInner {
	config: Configuration,
	assembler: Arc<ReportAssembler>,
	dispatcher: Dispatcher,
	sink: ErrorSink,
	closed: AtomicBool,
}

/// Client for reporting errors and sessions to the collector.
///
/// None of the methods return errors: delivery failures, sanitizer vetoes and
/// use after [`close`](Self::close) are passed to the internal error callback
/// instead.
///
/// # Example
///
/// ```ignore
/// use loom_notifier::{Breadcrumb, DiagnosticContext, Notifier, User};
///
/// let notifier = Notifier::builder()
///     .api_key("0123456789abcdef0123456789abcdef")
///     .app_version(env!("CARGO_PKG_VERSION"))
///     .release_stage("production")
///     .build()?;
///
/// let ctx = notifier.start_session(&DiagnosticContext::new()).await;
/// let ctx = ctx
///     .with_user(User::with_id("42"))
///     .with_breadcrumb(Breadcrumb::new("loaded profile"));
///
/// if let Err(e) = do_something() {
///     notifier.notify(&ctx, loom_notifier::wrap!(&ctx, e, "doing something")).await;
/// }
///
/// notifier.close().await;
/// ```
#[derive(Clone)]
pub struct Notifier {
	inner: Arc<NotifierInner>,
}

impl Notifier {
	/// Creates a new builder for constructing a Notifier.
	pub fn builder() -> NotifierBuilder {
		NotifierBuilder::new()
	}

	pub(crate) fn start(config: Configuration) -> Result<Self> {
		let transport = Arc::new(HttpTransport::new(&config)?);
		Self::with_transport(config, transport)
	}

	/// Starts a notifier delivering through `transport` instead of HTTP.
	pub fn with_transport(config: Configuration, transport: Arc<dyn Transport>) -> Result<Self> {
		let sink = ErrorSink::new(config.internal_error_callback.clone());
		let assembler = Arc::new(ReportAssembler::new(&config));
		let dispatcher = Dispatcher::spawn(
			transport,
			Arc::clone(&assembler),
			config.session_report_sanitizer.clone(),
			sink.clone(),
			config.session_publish_interval,
		)?;

		info!(
			notify_endpoint = %config.notify_endpoint,
			release_stage = %config.release_stage,
			"Notifier initialized"
		);

		Ok(Self {
			inner: Arc::new(NotifierInner {
				config,
				assembler,
				dispatcher,
				sink,
				closed: AtomicBool::new(false),
			}),
		})
	}

	/// Reports `err` with the diagnostic data of `ctx`.
	///
	/// The report is built and sanitized on the calling task, then queued
	/// for the worker. Waits only when the queue is full.
	pub async fn notify(&self, ctx: &DiagnosticContext, err: impl Into<BoxError>) {
		if self.check_closed("notify").is_err() {
			return;
		}

		let err = err.into();
		let mut report = self.inner.assembler.assemble(ctx, &*err);

		if let Some(sanitizer) = &self.inner.config.error_report_sanitizer {
			if let Err(reason) = sanitizer(&mut report) {
				self.inner.sink.report(NotifierError::Vetoed {
					kind: "error",
					reason,
				});
				return;
			}
		}

		debug!(error = %err, "Queueing error report");
		if let Err(e) = self.inner.dispatcher.enqueue_report(report).await {
			self.inner.sink.report(e);
		}
	}

	/// Starts a session and returns a context linked to it.
	///
	/// Every later report on the returned context, or on contexts derived
	/// from it, counts against this session.
	pub async fn start_session(&self, ctx: &DiagnosticContext) -> DiagnosticContext {
		if self.check_closed("start_session").is_err() {
			return ctx.clone();
		}

		let (ctx, session) = SessionTracker::start(ctx);
		if let Err(e) = self.inner.dispatcher.enqueue_session(session).await {
			self.inner.sink.report(e);
		}
		ctx
	}

	/// Sends everything queued, publishes pending sessions and stops the
	/// worker. Returns once the worker has exited.
	pub async fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			self.inner.sink.report(NotifierError::Closed { operation: "close" });
			return;
		}

		if let Err(e) = self.inner.dispatcher.shutdown().await {
			self.inner.sink.report(e);
		}
		info!("Notifier closed");
	}

	/// Returns true if the notifier has been closed.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Wraps `err` using the configured project module for frame
	/// classification.
	pub fn wrap(&self, ctx: &DiagnosticContext, err: impl Into<BoxError>) -> Error {
		Error::wrap_in_module(&self.inner.config.project_module, ctx, err, None)
	}

	/// Encodes `ctx` for propagation to another service.
	///
	/// Returns `None` and reports to the callback if encoding fails.
	pub fn serialize(&self, ctx: &DiagnosticContext) -> Option<String> {
		match ctx.serialize() {
			Ok(encoded) => Some(encoded),
			Err(e) => {
				self.inner.sink.report(e.into());
				None
			}
		}
	}

	/// Replaces the diagnostic data of `ctx` with `data` from
	/// [`serialize`](Self::serialize), keeping the session of `ctx`.
	///
	/// On malformed input the callback is invoked and `ctx` is returned
	/// unchanged.
	pub fn deserialize(&self, ctx: &DiagnosticContext, data: &str) -> DiagnosticContext {
		match ctx.deserialize_onto(data) {
			Ok(restored) => restored,
			Err(e) => {
				self.inner.sink.report(e.into());
				ctx.clone()
			}
		}
	}

	/// Returns the validated configuration this notifier was built with.
	pub fn configuration(&self) -> &Configuration {
		&self.inner.config
	}

	fn check_closed(&self, operation: &'static str) -> Result<()> {
		if self.inner.closed.load(Ordering::SeqCst) {
			self.inner.sink.report(NotifierError::Closed { operation });
			return Err(NotifierError::Closed { operation });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runtime::RuntimeMetadata;
	use loom_notifier_core::{ErrorReport, SessionReport};
	use parking_lot::Mutex;

	#[derive(Default)]
	struct RecordingTransport {
		reports: Mutex<Vec<ErrorReport>>,
		sessions: Mutex<Vec<SessionReport>>,
	}

	#[async_trait::async_trait]
	impl Transport for RecordingTransport {
		async fn send_report(&self, report: &ErrorReport) -> Result<()> {
			self.reports.lock().push(report.clone());
			Ok(())
		}

		async fn send_sessions(&self, report: &SessionReport) -> Result<()> {
			self.sessions.lock().push(report.clone());
			Ok(())
		}
	}

	fn builder() -> NotifierBuilder {
		Notifier::builder()
			.api_key("0123456789abcdef0123456789abcdef")
			.app_version("1.0.0")
			.release_stage("test")
			.runtime_metadata(RuntimeMetadata::empty())
	}

	fn start(builder: NotifierBuilder) -> (Notifier, Arc<RecordingTransport>) {
		let transport = Arc::new(RecordingTransport::default());
		let notifier =
			Notifier::with_transport(builder.into_configuration().unwrap(), transport.clone())
				.unwrap();
		(notifier, transport)
	}

	fn recorded_errors(builder: NotifierBuilder) -> (NotifierBuilder, Arc<Mutex<Vec<String>>>) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let captured = Arc::clone(&seen);
		let builder = builder.internal_error_callback(move |e| captured.lock().push(e.to_string()));
		(builder, seen)
	}

	#[test]
	fn test_build_outside_runtime_fails() {
		let err = builder().build().err().unwrap();
		assert!(matches!(err, NotifierError::NoRuntime));
	}

	#[test]
	fn test_build_rejects_invalid_configuration() {
		let result = tokio_test::block_on(async { builder().api_key("not-a-key").build() });
		assert!(matches!(result, Err(NotifierError::InvalidApiKey(_))));
	}

	#[tokio::test]
	async fn test_build_with_http_transport() {
		let notifier = builder().build().unwrap();
		assert!(!notifier.is_closed());
		assert_eq!(notifier.configuration().release_stage, "test");
		notifier.close().await;
		assert!(notifier.is_closed());
	}

	#[tokio::test]
	async fn test_notify_delivers_on_close() {
		let (notifier, transport) = start(builder());
		let ctx = DiagnosticContext::new().with_label("job");
		notifier.notify(&ctx, "first").await;
		notifier.notify(&ctx, notifier.wrap(&ctx, "second")).await;
		notifier.close().await;

		let reports = transport.reports.lock();
		assert_eq!(reports.len(), 2);
		assert_eq!(reports[0].events[0].context.as_deref(), Some("job"));
	}

	#[tokio::test]
	async fn test_session_counts_follow_reports() {
		let (notifier, transport) = start(builder());
		let ctx = notifier.start_session(&DiagnosticContext::new()).await;
		let session = Arc::clone(ctx.session().unwrap());

		notifier.notify(&ctx, "handled").await;
		notifier
			.notify(&ctx, Error::wrap(&ctx, "crash").unhandled())
			.await;
		notifier.close().await;

		let events = session.events();
		assert_eq!((events.handled, events.unhandled), (1, 1));
		let sessions = transport.sessions.lock();
		assert_eq!(sessions.len(), 1);
		assert_eq!(sessions[0].session_counts[0].sessions_started, 1);
		let reports = transport.reports.lock();
		let last = reports[1].events[0].session.as_ref().unwrap();
		assert_eq!(last.events.unhandled, 1);
	}

	#[tokio::test]
	async fn test_sanitizer_mutates_and_vetoes() {
		let (builder, seen) = recorded_errors(builder());
		let builder = builder.error_report_sanitizer(|report| {
			let event = &mut report.events[0];
			if event.exceptions[0].message.contains("secret") {
				return Err("contains secret".into());
			}
			event.metadata.clear();
			Ok(())
		});
		let (notifier, transport) = start(builder);

		let ctx = DiagnosticContext::new().with_metadatum("user", "ssn", "123");
		notifier.notify(&ctx, "secret leaked").await;
		notifier.notify(&ctx, "plain").await;
		notifier.close().await;

		let reports = transport.reports.lock();
		assert_eq!(reports.len(), 1);
		assert!(reports[0].events[0].metadata.is_empty());
		let seen = seen.lock();
		assert_eq!(seen.len(), 1);
		assert!(seen[0].contains("contains secret"));
	}

	#[tokio::test]
	async fn test_use_after_close_reports_operation() {
		let (builder, seen) = recorded_errors(builder());
		let (notifier, transport) = start(builder);
		notifier.close().await;

		let ctx = DiagnosticContext::new();
		notifier.notify(&ctx, "late").await;
		let returned = notifier.start_session(&ctx).await;
		notifier.close().await;

		assert!(returned.session().is_none());
		assert!(transport.reports.lock().is_empty());
		let seen = seen.lock();
		assert_eq!(seen.len(), 3);
		assert!(seen[0].contains("did you invoke notify after close"));
		assert!(seen[1].contains("did you invoke start_session after close"));
		assert!(seen[2].contains("did you invoke close after close"));
	}

	#[tokio::test]
	async fn test_serialize_deserialize_roundtrip() {
		let (builder, seen) = recorded_errors(builder());
		let (notifier, _transport) = start(builder);
		let upstream = DiagnosticContext::new()
			.with_label("upstream")
			.with_metadatum("trace", "id", "abc");
		let encoded = notifier.serialize(&upstream).unwrap();

		let local = notifier.start_session(&DiagnosticContext::new()).await;
		let restored = notifier.deserialize(&local, &encoded);
		assert_eq!(restored.label(), Some("upstream"));
		assert!(restored.session().is_some());

		let unchanged = notifier.deserialize(&local, "%%%");
		assert!(unchanged.label().is_none());
		assert_eq!(seen.lock().len(), 1);
		notifier.close().await;
	}
}
