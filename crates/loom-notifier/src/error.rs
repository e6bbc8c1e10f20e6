// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the notifier SDK.

use loom_notifier_core::NotifierCoreError;
use thiserror::Error;

/// Boxed error accepted by [`Notifier::notify`](crate::Notifier::notify) and
/// returned by sanitizers to veto a payload.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Errors that can occur in the notifier SDK.
///
/// Configuration errors are returned from
/// [`NotifierBuilder::build`](crate::NotifierBuilder::build). Every other
/// variant is delivered to the internal error callback and never surfaces
/// to the caller of `notify`, `start_session` or `close`.
#[derive(Debug, Error)]
pub enum NotifierError {
	/// API key is not 32 lowercase hex characters.
	#[error("API key must be 32 hex characters, but got {0:?}")]
	InvalidApiKey(String),

	/// App version is not semver.
	#[error("app version must be valid semver, but got {0:?}")]
	InvalidAppVersion(String),

	/// Release stage is empty.
	#[error("release stage must be set")]
	MissingReleaseStage,

	/// An endpoint is not an absolute URL.
	#[error("{name} endpoint must be a valid URL, but got {url:?}")]
	InvalidEndpoint {
		/// "notify" or "sessions".
		name: &'static str,
		url: String,
	},

	/// Only one of the two endpoints was configured.
	#[error("notify and sessions endpoints must both be set or both be left unset")]
	MismatchedEndpoints,

	/// An operation was invoked after `close`.
	#[error("notifier is closed: did you invoke {operation} after close?")]
	Closed {
		/// Name of the misused operation.
		operation: &'static str,
	},

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector returned a non-success status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body.
		message: String,
	},

	/// Failed to serialize a payload.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// A sanitizer vetoed sending a payload.
	#[error("{kind} report vetoed by sanitizer: {reason}")]
	Vetoed {
		/// "error" or "session".
		kind: &'static str,
		#[source]
		reason: BoxError,
	},

	/// Context envelope could not be encoded or decoded.
	#[error("diagnostic context error: {0}")]
	Context(#[from] NotifierCoreError),

	/// `build()` was called outside a tokio runtime.
	#[error("notifier must be built inside a tokio runtime")]
	NoRuntime,

	/// The background worker terminated abnormally.
	#[error("delivery worker failed: {0}")]
	WorkerFailed(String),
}

impl NotifierError {
	/// Returns true for errors raised by `build()`.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			Self::InvalidApiKey(_)
				| Self::InvalidAppVersion(_)
				| Self::MissingReleaseStage
				| Self::InvalidEndpoint { .. }
				| Self::MismatchedEndpoints
		)
	}
}
