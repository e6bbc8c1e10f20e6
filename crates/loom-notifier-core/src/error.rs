// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for notifier core types.

use thiserror::Error;

/// Errors that can occur while building or decoding diagnostic data.
#[derive(Debug, Error)]
pub enum NotifierCoreError {
	#[error("invalid breadcrumb type: {0}")]
	InvalidBreadcrumbType(String),

	#[error("invalid severity: {0}")]
	InvalidSeverity(String),

	#[error("context envelope is not valid base64: {0}")]
	InvalidEnvelopeEncoding(#[from] base64::DecodeError),

	#[error("context envelope serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for notifier core operations.
pub type Result<T> = std::result::Result<T, NotifierCoreError>;
