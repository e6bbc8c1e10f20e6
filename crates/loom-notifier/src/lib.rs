// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error and session notifier SDK for Rust applications.
//!
//! Reports errors with their full cause chain, the diagnostic context they
//! were raised under, and per-session handled/unhandled counts. Delivery
//! happens on a background task so reporting never blocks on the network.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_notifier::{wrap, Breadcrumb, DiagnosticContext, Notifier, User};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let notifier = Notifier::builder()
//!         .api_key("0123456789abcdef0123456789abcdef")
//!         .app_version(env!("CARGO_PKG_VERSION"))
//!         .release_stage("production")
//!         .build()?;
//!
//!     // One session per unit of work, e.g. per request
//!     let ctx = notifier.start_session(&DiagnosticContext::new()).await;
//!     let ctx = ctx
//!         .with_user(User::with_id("user_123").email("user@example.com"))
//!         .with_breadcrumb(Breadcrumb::new("Application started"))
//!         .with_metadatum("build", "commit", "abc123");
//!
//!     if let Err(e) = std::fs::read("config.toml") {
//!         notifier.notify(&ctx, wrap!(&ctx, e, "reading config")).await;
//!     }
//!
//!     // Flush queued reports and sessions
//!     notifier.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Diagnostic context**: Immutable, cheaply derived values carrying label, user, breadcrumbs and metadata
//! - **Error chains**: Every link becomes an exception, with context merged deepest first
//! - **Sessions**: Handled and unhandled counts per session, published in batches
//! - **Sanitizers**: Mutate or veto any payload before it leaves the process
//! - **Propagation**: Serialize a context to a string and restore it in another service

mod chain;
mod client;
mod config;
mod delivery;
mod dispatcher;
mod error;
mod http;
mod report;
mod runtime;
mod sessions;
mod stacktrace;
mod wrap;

pub use chain::{error_class, MAX_CHAIN_DEPTH};
pub use client::Notifier;
pub use config::{
	Configuration, ErrorReportSanitizer, InternalErrorCallback, NotifierBuilder,
	SessionReportSanitizer, DEFAULT_NOTIFY_ENDPOINT, DEFAULT_REQUEST_TIMEOUT,
	DEFAULT_SESSIONS_ENDPOINT, DEFAULT_SESSION_PUBLISH_INTERVAL, QUEUE_CAPACITY,
};
pub use delivery::{HttpTransport, Transport};
pub use error::{BoxError, NotifierError, Result};
pub use runtime::{MetricsSource, RuntimeMetadata};
pub use wrap::{Error, PanicError};

#[doc(hidden)]
pub use wrap::__crate_root;

// Re-export core types for convenience
pub use loom_notifier_core::{
	App, Breadcrumb, BreadcrumbType, Device, DiagnosticContext, ErrorReport, Event, EventCounts,
	Exception, Metadata, NotifierCoreError, Session, SessionId, SessionReport, Severity,
	SeverityReason, StackFrame, User,
};

pub(crate) const NOTIFIER_NAME: &str = "Loom Rust Notifier";
pub(crate) const NOTIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub(crate) const NOTIFIER_URL: &str = "https://github.com/ghuntley/loom";
