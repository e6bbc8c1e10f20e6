// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event severity and the reason it was assigned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifierCoreError;

/// Severity level of an error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	/// Informational, not a failure.
	Info,
	/// Handled failure. Default for handled errors.
	Warning,
	/// Unhandled failure or panic.
	Error,
}

impl Severity {
	/// Returns the wire name of the severity.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Severity {
	type Err = NotifierCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			_ => Err(NotifierCoreError::InvalidSeverity(s.to_string())),
		}
	}
}

/// Why a severity was assigned to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityReason {
	/// Error reported by the application after handling it.
	HandledException,
	/// Error that escaped the application's handling.
	UnhandledException,
	/// Recovered panic.
	HandledPanic,
	/// Panic that crashed the operation.
	UnhandledPanic,
	/// Severity set explicitly on a wrapped error.
	UserSpecifiedSeverity,
}

impl SeverityReason {
	/// Derives the reason from the unhandled and panic flags of an error.
	pub fn from_flags(unhandled: bool, panic: bool) -> Self {
		match (unhandled, panic) {
			(false, false) => Self::HandledException,
			(true, false) => Self::UnhandledException,
			(false, true) => Self::HandledPanic,
			(true, true) => Self::UnhandledPanic,
		}
	}

	/// Returns the wire tag sent as `severityReason.type`.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::HandledException => "handledException",
			Self::UnhandledException => "unhandledException",
			Self::HandledPanic => "handledPanic",
			Self::UnhandledPanic => "unhandledPanic",
			Self::UserSpecifiedSeverity => "userSpecifiedSeverity",
		}
	}
}

impl fmt::Display for SeverityReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reason_from_flags() {
		assert_eq!(SeverityReason::from_flags(false, false).as_str(), "handledException");
		assert_eq!(SeverityReason::from_flags(true, false).as_str(), "unhandledException");
		assert_eq!(SeverityReason::from_flags(false, true).as_str(), "handledPanic");
		assert_eq!(SeverityReason::from_flags(true, true).as_str(), "unhandledPanic");
	}

	#[test]
	fn test_serde_matches_display() {
		for reason in [
			SeverityReason::HandledException,
			SeverityReason::UnhandledPanic,
			SeverityReason::UserSpecifiedSeverity,
		] {
			let json = serde_json::to_value(reason).unwrap();
			assert_eq!(json, reason.to_string());
		}
		assert_eq!(serde_json::to_value(Severity::Warning).unwrap(), "warning");
	}

	#[test]
	fn test_severity_parse() {
		assert_eq!("info".parse::<Severity>().unwrap(), Severity::Info);
		assert!("fatal".parse::<Severity>().is_err());
	}
}
