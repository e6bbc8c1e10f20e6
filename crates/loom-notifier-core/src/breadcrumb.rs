// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (events leading up to an error).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifierCoreError;

/// A timestamped record of something that happened before an error.
///
/// Breadcrumbs are immutable once attached to a
/// [`DiagnosticContext`](crate::DiagnosticContext). The short serde keys are
/// the compact form used by the context envelope; the wire form sent to the
/// collector is [`PayloadBreadcrumb`](crate::payload::PayloadBreadcrumb).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	/// Short summary, e.g. "loaded user profile".
	#[serde(rename = "na")]
	pub name: String,
	#[serde(rename = "ty", default)]
	pub breadcrumb_type: BreadcrumbType,
	#[serde(rename = "md", default, skip_serializing_if = "Map::is_empty")]
	pub metadata: Map<String, Value>,
	/// Set to the attach time when left empty.
	#[serde(rename = "ts", default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
}

impl Breadcrumb {
	/// Creates a manual breadcrumb with the given name.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			breadcrumb_type: BreadcrumbType::Manual,
			metadata: Map::new(),
			timestamp: None,
		}
	}

	/// Sets the breadcrumb type.
	pub fn with_type(mut self, breadcrumb_type: BreadcrumbType) -> Self {
		self.breadcrumb_type = breadcrumb_type;
		self
	}

	/// Adds one metadata entry.
	pub fn with_metadatum(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}

	/// Sets the time the event happened instead of the attach time.
	pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}
}

/// Category of a breadcrumb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbType {
	/// User-defined, manually added breadcrumbs.
	#[default]
	Manual,
	/// Changing screens or content being displayed.
	Navigation,
	/// Sending and receiving requests and responses.
	Request,
	/// Performing an intensive task or query.
	Process,
	/// Messages sent to a logging platform.
	Log,
	/// Actions performed by the user.
	User,
	/// Changes to the overall state of the app or device.
	State,
	/// An error reported earlier in the same session.
	Error,
}

impl BreadcrumbType {
	pub const ALL: [BreadcrumbType; 8] = [
		Self::Manual,
		Self::Navigation,
		Self::Request,
		Self::Process,
		Self::Log,
		Self::User,
		Self::State,
		Self::Error,
	];

	/// Returns the wire name of the type.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Manual => "manual",
			Self::Navigation => "navigation",
			Self::Request => "request",
			Self::Process => "process",
			Self::Log => "log",
			Self::User => "user",
			Self::State => "state",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for BreadcrumbType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BreadcrumbType {
	type Err = NotifierCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| NotifierCoreError::InvalidBreadcrumbType(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn default_type_is_manual() {
		assert_eq!(Breadcrumb::new("x").breadcrumb_type, BreadcrumbType::Manual);
		assert_eq!(BreadcrumbType::default(), BreadcrumbType::Manual);
	}

	#[test]
	fn unknown_type_is_rejected() {
		let err = "telepathy".parse::<BreadcrumbType>().unwrap_err();
		assert!(matches!(err, NotifierCoreError::InvalidBreadcrumbType(s) if s == "telepathy"));
	}

	#[test]
	fn envelope_form_uses_short_keys() {
		let bc = Breadcrumb::new("log event")
			.with_type(BreadcrumbType::Log)
			.with_metadatum("msg", "ruh roh");
		let json = serde_json::to_value(&bc).unwrap();
		assert_eq!(json["na"], "log event");
		assert_eq!(json["ty"], "log");
		assert_eq!(json["md"]["msg"], "ruh roh");
		assert!(json.get("ts").is_none());
	}

	proptest! {
		#[test]
		fn breadcrumb_type_roundtrip(idx in 0usize..8) {
			let t = BreadcrumbType::ALL[idx];
			let parsed: BreadcrumbType = t.to_string().parse().unwrap();
			prop_assert_eq!(t, parsed);
		}
	}
}
