// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom error notifier.
//!
//! This crate holds the data model shared by the notifier SDK: the immutable
//! [`DiagnosticContext`], breadcrumbs, sessions, severities and the wire
//! payloads sent to the collector. It performs no I/O.

pub mod breadcrumb;
pub mod context;
pub mod error;
pub mod payload;
pub mod session;
pub mod severity;

pub use breadcrumb::{Breadcrumb, BreadcrumbType};
pub use context::{DiagnosticContext, Metadata, User};
pub use error::{NotifierCoreError, Result};
pub use payload::{
	App, Device, ErrorReport, Event, EventSession, Exception, NotifierInfo, PayloadBreadcrumb,
	Request, SessionCounts, SessionEvents, SessionReport, SeverityReasonPayload, StackFrame,
	ERROR_PAYLOAD_VERSION, SESSION_PAYLOAD_VERSION,
};
pub use session::{EventCounts, Session, SessionId};
pub use severity::{Severity, SeverityReason};
