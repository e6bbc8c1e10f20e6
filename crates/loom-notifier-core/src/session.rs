// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types for stability tracking.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
	/// Generates a random v4 identifier.
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Handled and unhandled event counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
	pub handled: u32,
	pub unhandled: u32,
}

/// One tracked unit of work, e.g. a single request.
///
/// Sessions are shared by reference (`Arc<Session>`) from every context
/// derived after `start_session`, so all reports on those contexts increment
/// the same counters. Counters only increase.
#[derive(Debug)]
pub struct Session {
	pub id: SessionId,
	pub started_at: DateTime<Utc>,
	events: Mutex<EventCounts>,
}

impl Session {
	/// Starts a session now with zeroed counters.
	#[must_use]
	pub fn new() -> Self {
		Self::started_at(Utc::now())
	}

	#[must_use]
	pub fn started_at(started_at: DateTime<Utc>) -> Self {
		Self {
			id: SessionId::new(),
			started_at,
			events: Mutex::new(EventCounts::default()),
		}
	}

	/// Increments the handled or unhandled counter and returns the counts
	/// after the increment.
	pub fn record(&self, unhandled: bool) -> EventCounts {
		let mut events = self.events.lock();
		if unhandled {
			events.unhandled = events.unhandled.saturating_add(1);
		} else {
			events.handled = events.handled.saturating_add(1);
		}
		*events
	}

	/// Returns a snapshot of the counters.
	pub fn events(&self) -> EventCounts {
		*self.events.lock()
	}
}

impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}
