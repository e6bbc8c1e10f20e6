// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapped errors carrying a stacktrace and a diagnostic context snapshot.

use std::any::Any;
use std::fmt;

use loom_notifier_core::{DiagnosticContext, Severity, StackFrame};

use crate::error::BoxError;
use crate::stacktrace;

#[doc(hidden)]
pub fn __crate_root(module_path: &'static str) -> &'static str {
	module_path.split("::").next().unwrap_or(module_path)
}

/// One link in an error chain.
///
/// The stacktrace and context snapshot are taken once, when the error is
/// wrapped, and never change afterwards. Only errors created through the
/// [`wrap!`](crate::wrap!) macro or [`Notifier::wrap`](crate::Notifier::wrap)
/// know which crate is the project; the plain constructors mark only the
/// program's `main` as in project.
///
/// # Example
///
/// ```ignore
/// use loom_notifier::{wrap, DiagnosticContext, Severity};
///
/// let ctx = DiagnosticContext::new().with_label("GET /users/:id");
/// let err = wrap!(&ctx, io_err, "loading user {}", id)
///     .unhandled()
///     .with_severity(Severity::Error);
/// notifier.notify(&ctx, err).await;
/// ```
#[derive(Debug)]
pub struct Error {
	inner: BoxError,
	message: Option<String>,
	stacktrace: Vec<StackFrame>,
	context: Option<DiagnosticContext>,
	unhandled: bool,
	panic: bool,
	severity: Option<Severity>,
}

impl Error {
	/// Wraps `err` without a context snapshot.
	pub fn new(err: impl Into<BoxError>) -> Self {
		Self::build("", None, err.into(), None)
	}

	/// Wraps `err`, capturing the current stack and a snapshot of `ctx`.
	pub fn wrap(ctx: &DiagnosticContext, err: impl Into<BoxError>) -> Self {
		Self::build("", Some(ctx.clone()), err.into(), None)
	}

	/// Like [`wrap`](Self::wrap), displaying as `"<message>: <err>"`.
	pub fn wrap_with_message(
		ctx: &DiagnosticContext,
		err: impl Into<BoxError>,
		message: impl Into<String>,
	) -> Self {
		Self::build(
			"",
			Some(ctx.clone()),
			err.into(),
			Some(message.into()),
		)
	}

	/// Wraps `err`, marking frames of `project_module` as in project.
	#[doc(hidden)]
	pub fn wrap_in_module(
		project_module: &str,
		ctx: &DiagnosticContext,
		err: impl Into<BoxError>,
		message: Option<String>,
	) -> Self {
		Self::build(project_module, Some(ctx.clone()), err.into(), message)
	}

	/// Turns a `catch_unwind` payload into an unhandled panic error.
	pub fn from_panic(ctx: &DiagnosticContext, payload: Box<dyn Any + Send>) -> Self {
		Self::wrap(ctx, PanicError::from_payload(payload))
			.unhandled()
			.panicked()
	}

	fn build(
		project_module: &str,
		context: Option<DiagnosticContext>,
		inner: BoxError,
		message: Option<String>,
	) -> Self {
		Self {
			inner,
			message: message.filter(|m| !m.is_empty()),
			stacktrace: stacktrace::capture(project_module),
			context,
			unhandled: false,
			panic: false,
			severity: None,
		}
	}

	/// Marks the error as not handled by the application.
	#[must_use]
	pub fn unhandled(mut self) -> Self {
		self.unhandled = true;
		self
	}

	/// Marks the error as originating from a panic.
	#[must_use]
	pub fn panicked(mut self) -> Self {
		self.panic = true;
		self
	}

	/// Sets an explicit severity, overriding the one derived from the flags.
	#[must_use]
	pub fn with_severity(mut self, severity: Severity) -> Self {
		self.severity = Some(severity);
		self
	}

	/// Returns the message given at wrap time.
	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	/// Returns the frames captured at wrap time, innermost first.
	pub fn stacktrace(&self) -> &[StackFrame] {
		&self.stacktrace
	}

	/// Returns the context snapshot taken at wrap time.
	pub fn context(&self) -> Option<&DiagnosticContext> {
		self.context.as_ref()
	}

	pub fn is_unhandled(&self) -> bool {
		self.unhandled
	}

	pub fn is_panic(&self) -> bool {
		self.panic
	}

	pub fn severity(&self) -> Option<Severity> {
		self.severity
	}

	/// Returns the wrapped error.
	pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
		&*self.inner
	}

	pub fn into_inner(self) -> BoxError {
		self.inner
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.message {
			Some(message) => write!(f, "{}: {}", message, self.inner),
			None => write!(f, "{}", self.inner),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&*self.inner)
	}
}

/// A panic converted into an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
	message: String,
}

impl PanicError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	/// Extracts the message from a `catch_unwind` payload.
	///
	/// Payloads that are neither `&str` nor `String` become `Box<dyn Any>`.
	pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(s) = payload.downcast_ref::<&str>() {
			(*s).to_string()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			"Box<dyn Any>".to_string()
		};
		Self { message }
	}
}

impl fmt::Display for PanicError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "panic: {}", self.message)
	}
}

impl std::error::Error for PanicError {}

/// Wraps an error, classifying frames of the calling crate as in project.
///
/// ```ignore
/// let err = loom_notifier::wrap!(&ctx, io_err);
/// let err = loom_notifier::wrap!(&ctx, io_err, "reading {}", path.display());
/// ```
#[macro_export]
macro_rules! wrap {
	($ctx:expr, $err:expr $(,)?) => {
		$crate::Error::wrap_in_module(
			$crate::__crate_root(::core::module_path!()),
			$ctx,
			$err,
			::core::option::Option::None,
		)
	};
	($ctx:expr, $err:expr, $($arg:tt)+) => {
		$crate::Error::wrap_in_module(
			$crate::__crate_root(::core::module_path!()),
			$ctx,
			$err,
			::core::option::Option::Some(::std::format!($($arg)+)),
		)
	};
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::error::Error as _;
	use std::io;

	#[test]
	fn test_display_with_and_without_message() {
		let ctx = DiagnosticContext::new();
		let plain = Error::wrap(&ctx, io::Error::new(io::ErrorKind::Other, "disk full"));
		assert_eq!(plain.to_string(), "disk full");

		let wrapped = Error::wrap_with_message(
			&ctx,
			io::Error::new(io::ErrorKind::Other, "disk full"),
			"saving report",
		);
		assert_eq!(wrapped.to_string(), "saving report: disk full");
		assert_eq!(wrapped.message(), Some("saving report"));
	}

	#[test]
	fn test_snapshot_is_taken_at_wrap_time() {
		let ctx = DiagnosticContext::new().with_label("before");
		let err = Error::wrap(&ctx, "boom");
		let _later = ctx.with_label("after");
		assert_eq!(err.context().and_then(|c| c.label()), Some("before"));
		assert!(Error::new("boom").context().is_none());
	}

	#[test]
	fn test_flags_default_off() {
		let err = Error::new("boom");
		assert!(!err.is_unhandled());
		assert!(!err.is_panic());
		assert_eq!(err.severity(), None);

		let err = err.unhandled().panicked().with_severity(Severity::Info);
		assert!(err.is_unhandled());
		assert!(err.is_panic());
		assert_eq!(err.severity(), Some(Severity::Info));
	}

	#[test]
	fn test_source_is_inner() {
		let err = Error::new(io::Error::new(io::ErrorKind::NotFound, "missing"));
		let source = err.source().unwrap();
		assert!(source.downcast_ref::<io::Error>().is_some());
	}

	#[test]
	fn test_from_panic_payloads() {
		let ctx = DiagnosticContext::new();
		let payload = std::panic::catch_unwind(|| panic!("index out of range")).unwrap_err();
		let err = Error::from_panic(&ctx, payload);
		assert!(err.is_unhandled());
		assert!(err.is_panic());
		assert_eq!(err.to_string(), "panic: index out of range");

		let formatted = std::panic::catch_unwind(|| panic!("bad id {}", 7)).unwrap_err();
		assert_eq!(PanicError::from_payload(formatted).to_string(), "panic: bad id 7");

		let opaque: Box<dyn Any + Send> = Box::new(42_u8);
		assert_eq!(PanicError::from_payload(opaque).to_string(), "panic: Box<dyn Any>");
	}

	#[test]
	fn test_macro_formats_message() {
		let ctx = DiagnosticContext::new();
		let err = crate::wrap!(&ctx, "inner", "step {}", 3);
		assert_eq!(err.to_string(), "step 3: inner");
		let err = crate::wrap!(&ctx, "inner");
		assert_eq!(err.message(), None);
	}

	#[test]
	fn test_crate_root() {
		assert_eq!(__crate_root("my_app::handlers::users"), "my_app");
		assert_eq!(__crate_root("my_app"), "my_app");
	}
}
