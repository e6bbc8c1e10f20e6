// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error chain walking and aggregation.
//!
//! A chain is unwrapped link by link through a fixed, ordered list of
//! [`ChainAdapter`]s. The first adapter that recognises a link decides what
//! the next link is. The links then yield the exception list (innermost
//! first), the merged diagnostic context, and the event's severity.

use std::error::Error as StdError;
use std::io;

use loom_notifier_core::{DiagnosticContext, Exception, Severity, SeverityReason};
use tracing::debug;

use crate::wrap::{Error, PanicError};

/// Upper bound on the number of links walked, guarding against cycles.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// Result of asking an adapter for the next link.
pub enum Unwrapped<'a> {
	/// The adapter does not handle this error type.
	Unsupported,
	/// The error is the innermost link.
	Innermost,
	/// The error wraps this inner error.
	Next(&'a (dyn StdError + 'static)),
}

/// One error-wrapping convention.
pub trait ChainAdapter: Send + Sync {
	fn unwrap_link<'a>(&self, err: &'a (dyn StdError + 'static)) -> Unwrapped<'a>;
}

/// Unwraps [`Error`] to the error it decorates.
pub struct WrappedAdapter;

impl ChainAdapter for WrappedAdapter {
	fn unwrap_link<'a>(&self, err: &'a (dyn StdError + 'static)) -> Unwrapped<'a> {
		match err.downcast_ref::<Error>() {
			Some(wrapped) => Unwrapped::Next(wrapped.inner()),
			None => Unwrapped::Unsupported,
		}
	}
}

/// Unwraps `std::io::Error` to its custom payload.
///
/// `io::Error::source` skips the payload itself, so it is reached through
/// `get_ref` instead. An `io::Error` whose payload is another `io::Error`
/// shell is unwrapped twice.
pub struct IoAdapter;

impl ChainAdapter for IoAdapter {
	fn unwrap_link<'a>(&self, err: &'a (dyn StdError + 'static)) -> Unwrapped<'a> {
		let Some(io_err) = err.downcast_ref::<io::Error>() else {
			return Unwrapped::Unsupported;
		};
		match io_err.get_ref() {
			None => Unwrapped::Innermost,
			Some(payload) => {
				if let Some(nested) = payload.downcast_ref::<io::Error>() {
					if let Some(inner) = nested.get_ref() {
						return Unwrapped::Next(inner);
					}
				}
				Unwrapped::Next(payload)
			}
		}
	}
}

/// Follows `std::error::Error::source`.
pub struct SourceAdapter;

impl ChainAdapter for SourceAdapter {
	fn unwrap_link<'a>(&self, err: &'a (dyn StdError + 'static)) -> Unwrapped<'a> {
		match err.source() {
			Some(next) => Unwrapped::Next(next),
			None => Unwrapped::Innermost,
		}
	}
}

/// Everything derived from one error chain.
#[derive(Debug, Clone)]
pub struct Aggregate {
	/// Innermost exception first.
	pub exceptions: Vec<Exception>,
	/// Caller context overlaid with each wrap snapshot, deepest winning.
	pub context: DiagnosticContext,
	pub severity: Severity,
	pub severity_reason: SeverityReason,
	/// True if any wrapped link is unhandled.
	pub unhandled: bool,
}

/// Walks error chains with an ordered list of adapters.
pub struct ChainWalker {
	adapters: Vec<Box<dyn ChainAdapter>>,
}

impl Default for ChainWalker {
	fn default() -> Self {
		Self {
			adapters: vec![
				Box::new(WrappedAdapter),
				Box::new(IoAdapter),
				Box::new(SourceAdapter),
			],
		}
	}
}

impl ChainWalker {
	/// Returns the links of the chain, outermost first.
	pub fn links<'a>(&self, root: &'a (dyn StdError + 'static)) -> Vec<&'a (dyn StdError + 'static)> {
		let mut links = vec![root];
		let mut current = root;

		while links.len() < MAX_CHAIN_DEPTH {
			let next = self
				.adapters
				.iter()
				.map(|adapter| adapter.unwrap_link(current))
				.find(|step| !matches!(step, Unwrapped::Unsupported));
			match next {
				Some(Unwrapped::Next(inner)) => {
					links.push(inner);
					current = inner;
				}
				_ => return links,
			}
		}

		debug!(max_depth = MAX_CHAIN_DEPTH, "Error chain truncated");
		links
	}

	/// Aggregates the chain rooted at `root` reported from `ctx`.
	pub fn aggregate(&self, ctx: &DiagnosticContext, root: &(dyn StdError + 'static)) -> Aggregate {
		let links = self.links(root);

		let exceptions = links
			.iter()
			.rev()
			.map(|link| Exception {
				error_class: error_class(*link),
				message: link.to_string(),
				stacktrace: link
					.downcast_ref::<Error>()
					.map(|wrapped| wrapped.stacktrace().to_vec()),
			})
			.collect();

		// Outermost to innermost.
		let wrapped: Vec<&Error> = links
			.iter()
			.filter_map(|link| link.downcast_ref::<Error>())
			.collect();

		let mut context = wrapped
			.iter()
			.filter_map(|err| err.context())
			.fold(ctx.clone(), |merged, deeper| merged.merge_from(deeper));
		if context.label().map_or(true, str::is_empty) {
			context = context.with_label(root.to_string());
		}

		let (severity, severity_reason) = resolve_severity(&wrapped);

		Aggregate {
			exceptions,
			context,
			severity,
			severity_reason,
			unhandled: wrapped.iter().any(|err| err.is_unhandled()),
		}
	}
}

/// Resolves severity from wrapped links ordered outermost first.
fn resolve_severity(wrapped: &[&Error]) -> (Severity, SeverityReason) {
	if let Some(severity) = wrapped.iter().rev().find_map(|err| err.severity()) {
		return (severity, SeverityReason::UserSpecifiedSeverity);
	}

	let severity = if wrapped.iter().any(|err| err.is_unhandled() || err.is_panic()) {
		Severity::Error
	} else {
		Severity::Warning
	};
	let reason = wrapped
		.last()
		.map(|deepest| SeverityReason::from_flags(deepest.is_unhandled(), deepest.is_panic()))
		.unwrap_or(SeverityReason::HandledException);

	(severity, reason)
}

/// Names the concrete type of `err`.
///
/// Known types use their type name. Anything else is named from its `Debug`
/// output, which for derived impls starts with the type name.
pub fn error_class(err: &(dyn StdError + 'static)) -> String {
	if err.is::<Error>() {
		return std::any::type_name::<Error>().to_string();
	}
	if err.is::<PanicError>() {
		return std::any::type_name::<PanicError>().to_string();
	}
	if err.is::<io::Error>() {
		return "std::io::Error".to_string();
	}
	parse_type_from_debug(&format!("{err:?}"))
}

fn parse_type_from_debug(debug: &str) -> String {
	let debug = debug.trim_start();
	if debug.starts_with('"') {
		return "StringError".to_string();
	}
	let name: String = debug
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
		.collect();
	if name.is_empty() {
		"Error".to_string()
	} else {
		name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_notifier_core::Breadcrumb;
	use serde_json::json;
	use std::fmt;

	#[derive(Debug)]
	struct ParseError {
		source: io::Error,
	}

	impl fmt::Display for ParseError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "parse failed")
		}
	}

	impl StdError for ParseError {
		fn source(&self) -> Option<&(dyn StdError + 'static)> {
			Some(&self.source)
		}
	}

	#[derive(Debug)]
	struct Timeout;

	impl fmt::Display for Timeout {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "timed out")
		}
	}

	impl StdError for Timeout {}

	/// wrapped(ctx outer) -> ParseError -> io::Error -> wrapped(ctx inner) -> Timeout
	fn four_link_chain() -> Error {
		let inner_ctx = DiagnosticContext::new()
			.with_label("inner")
			.with_breadcrumb(Breadcrumb::new("inner bc"))
			.with_metadatum("tab", "k", "inner");
		let innermost = Error::wrap(&inner_ctx, Timeout).unhandled();
		let io_err = io::Error::new(io::ErrorKind::Other, innermost);
		let parse = ParseError { source: io_err };
		let outer_ctx = DiagnosticContext::new()
			.with_label("outer")
			.with_metadatum("tab", "k", "outer")
			.with_metadatum("tab", "only_outer", true);
		Error::wrap_with_message(&outer_ctx, parse, "handling request")
	}

	#[test]
	fn test_links_follow_every_convention() {
		let root = four_link_chain();
		let links = ChainWalker::default().links(&root);
		assert_eq!(links.len(), 5);
		assert!(links[0].is::<Error>());
		assert!(links[1].is::<ParseError>());
		assert!(links[2].is::<io::Error>());
		assert!(links[3].is::<Error>());
		assert!(links[4].is::<Timeout>());
	}

	#[test]
	fn test_exceptions_innermost_first_with_stacktraces_only_on_wrapped() {
		let root = four_link_chain();
		let agg = ChainWalker::default().aggregate(&DiagnosticContext::new(), &root);

		assert_eq!(agg.exceptions.len(), 5);
		assert_eq!(agg.exceptions[0].message, "timed out");
		assert!(agg.exceptions[0].error_class.ends_with("Timeout"));
		assert!(agg.exceptions[0].stacktrace.is_none());
		assert!(agg.exceptions[1].stacktrace.is_some());
		assert_eq!(agg.exceptions[2].error_class, "std::io::Error");
		assert!(agg.exceptions[2].stacktrace.is_none());
		assert!(agg.exceptions[3].stacktrace.is_none());
		assert_eq!(agg.exceptions[4].message, "handling request: parse failed");
		assert!(agg.exceptions[4].stacktrace.is_some());
	}

	#[test]
	fn test_context_deepest_wins() {
		let root = four_link_chain();
		let caller = DiagnosticContext::new()
			.with_label("caller")
			.with_metadatum("caller_tab", "x", 1);
		let agg = ChainWalker::default().aggregate(&caller, &root);

		assert_eq!(agg.context.label(), Some("inner"));
		assert_eq!(agg.context.breadcrumbs()[0].name, "inner bc");
		let md = agg.context.metadata();
		assert_eq!(md["tab"]["k"], json!("inner"));
		assert_eq!(md["tab"]["only_outer"], json!(true));
		assert_eq!(md["caller_tab"]["x"], json!(1));
		assert!(agg.unhandled);
	}

	#[test]
	fn test_label_defaults_to_root_message() {
		let root = Error::new(Timeout);
		let agg = ChainWalker::default().aggregate(&DiagnosticContext::new(), &root);
		assert_eq!(agg.context.label(), Some("timed out"));
	}

	#[test]
	fn test_severity_table() {
		let walker = ChainWalker::default();
		let ctx = DiagnosticContext::new();
		let cases = [
			(Error::new(Timeout), Severity::Warning, SeverityReason::HandledException),
			(Error::new(Timeout).unhandled(), Severity::Error, SeverityReason::UnhandledException),
			(Error::new(Timeout).panicked(), Severity::Error, SeverityReason::HandledPanic),
			(
				Error::new(Timeout).unhandled().panicked(),
				Severity::Error,
				SeverityReason::UnhandledPanic,
			),
			(
				Error::new(Timeout)
					.unhandled()
					.panicked()
					.with_severity(Severity::Error),
				Severity::Error,
				SeverityReason::UserSpecifiedSeverity,
			),
			(
				Error::new(Timeout).with_severity(Severity::Info),
				Severity::Info,
				SeverityReason::UserSpecifiedSeverity,
			),
		];
		for (err, severity, reason) in cases {
			let agg = walker.aggregate(&ctx, &err);
			assert_eq!(agg.severity, severity, "{err:?}");
			assert_eq!(agg.severity_reason, reason, "{err:?}");
		}
	}

	#[test]
	fn test_plain_error_is_handled_warning() {
		let agg = ChainWalker::default().aggregate(&DiagnosticContext::new(), &Timeout);
		assert_eq!(agg.severity, Severity::Warning);
		assert_eq!(agg.severity_reason, SeverityReason::HandledException);
		assert!(!agg.unhandled);
		assert_eq!(agg.exceptions.len(), 1);
	}

	#[test]
	fn test_deepest_explicit_severity_wins() {
		let inner = Error::new(Timeout).with_severity(Severity::Info);
		let outer = Error::new(inner).with_severity(Severity::Error);
		let agg = ChainWalker::default().aggregate(&DiagnosticContext::new(), &outer);
		assert_eq!(agg.severity, Severity::Info);
	}

	#[test]
	fn test_io_double_nesting_is_unwrapped() {
		let shell = io::Error::new(io::ErrorKind::Other, Timeout);
		let outer = io::Error::new(io::ErrorKind::Other, shell);
		let links = ChainWalker::default().links(&outer);
		assert_eq!(links.len(), 2);
		assert!(links[1].is::<Timeout>());
	}

	#[test]
	fn test_custom_adapter_order() {
		struct StopAtParse;

		impl ChainAdapter for StopAtParse {
			fn unwrap_link<'a>(&self, err: &'a (dyn StdError + 'static)) -> Unwrapped<'a> {
				if err.is::<ParseError>() {
					Unwrapped::Innermost
				} else {
					Unwrapped::Unsupported
				}
			}
		}

		let walker = ChainWalker {
			adapters: vec![
				Box::new(StopAtParse),
				Box::new(WrappedAdapter),
				Box::new(SourceAdapter),
			],
		};
		let root = four_link_chain();
		let links = walker.links(&root);
		assert_eq!(links.len(), 2);
		assert!(links[1].is::<ParseError>());
	}

	#[test]
	fn test_error_class_from_debug() {
		assert_eq!(parse_type_from_debug("ParseError { source: .. }"), "ParseError");
		assert_eq!(parse_type_from_debug("Timeout"), "Timeout");
		assert_eq!(parse_type_from_debug("\"boom\""), "StringError");
		assert_eq!(parse_type_from_debug("()"), "Error");

		let boxed: crate::error::BoxError = "boom".into();
		assert_eq!(error_class(&*boxed), "StringError");
	}
}
