// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session creation, event counting and batching of session starts.

use std::sync::Arc;

use loom_notifier_core::{DiagnosticContext, EventSession, Session};
use tracing::debug;

/// Sessions started since the last flush.
///
/// Owned by the delivery worker; callers only ever hand sessions over via
/// the worker's queue.
#[derive(Debug, Default)]
pub struct SessionTracker {
	pending: Vec<Arc<Session>>,
}

impl SessionTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a session and returns a context referencing it.
	pub fn start(ctx: &DiagnosticContext) -> (DiagnosticContext, Arc<Session>) {
		let session = Arc::new(Session::new());
		debug!(session_id = %session.id, "Session started");
		(ctx.with_session(Arc::clone(&session)), session)
	}

	/// Counts one event against the session referenced by `ctx`.
	///
	/// Returns the session linkage for the event payload, or `None` when no
	/// session was started on this context.
	pub fn record_event(ctx: &DiagnosticContext, unhandled: bool) -> Option<EventSession> {
		let session = ctx.session()?;
		let counts = session.record(unhandled);
		Some(EventSession::new(session, counts))
	}

	/// Adds a started session to the next batch.
	pub fn track(&mut self, session: Arc<Session>) {
		self.pending.push(session);
		debug!(pending = self.pending(), "Session tracked");
	}

	/// Returns the number of sessions waiting for the next flush.
	pub fn pending(&self) -> usize {
		self.pending.len()
	}

	/// Removes and returns every pending session.
	pub fn take_batch(&mut self) -> Vec<Arc<Session>> {
		std::mem::take(&mut self.pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_notifier_core::EventCounts;

	#[test]
	fn test_start_links_session_to_context() {
		let ctx = DiagnosticContext::new().with_label("req");
		let (ctx2, session) = SessionTracker::start(&ctx);
		assert!(ctx.session().is_none());
		assert!(Arc::ptr_eq(ctx2.session().unwrap(), &session));
		assert_eq!(ctx2.label(), Some("req"));
		assert_eq!(session.events(), EventCounts::default());
	}

	#[test]
	fn test_record_event_counts_both_kinds() {
		let (ctx, session) = SessionTracker::start(&DiagnosticContext::new());
		let first = SessionTracker::record_event(&ctx, false).unwrap();
		assert_eq!(first.events.handled, 1);
		assert_eq!(first.events.unhandled, 0);

		let derived = ctx.with_breadcrumb(loom_notifier_core::Breadcrumb::new("later"));
		let second = SessionTracker::record_event(&derived, true).unwrap();
		assert_eq!(second.id, session.id.to_string());
		assert_eq!(session.events(), EventCounts { handled: 1, unhandled: 1 });
	}

	#[test]
	fn test_record_event_without_session() {
		assert!(SessionTracker::record_event(&DiagnosticContext::new(), true).is_none());
	}

	#[test]
	fn test_take_batch_empties_pending() {
		let mut tracker = SessionTracker::new();
		tracker.track(Arc::new(Session::new()));
		tracker.track(Arc::new(Session::new()));
		assert_eq!(tracker.pending(), 2);
		assert_eq!(tracker.take_batch().len(), 2);
		assert_eq!(tracker.pending(), 0);
		assert!(tracker.take_batch().is_empty());
	}
}
