// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client construction with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::error::{NotifierError, Result};
use crate::NOTIFIER_VERSION;

/// Creates a client builder with the notifier User-Agent.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates the client used for all deliveries of one notifier.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client> {
	builder()
		.timeout(timeout)
		.build()
		.map_err(NotifierError::RequestFailed)
}

/// Returns the notifier User-Agent string.
///
/// Format: `loom-notifier/{version} ({platform})`
pub fn user_agent() -> String {
	format!(
		"loom-notifier/{} ({})",
		NOTIFIER_VERSION,
		env!("LOOM_NOTIFIER_PLATFORM")
	)
}
