// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Report a wrapped error and a captured panic.
//!
//! Run with:
//!   BUGSNAG_API_KEY=... cargo run --example capture -p loom-notifier

use std::io;

use loom_notifier::{
	wrap, Breadcrumb, BreadcrumbType, Configuration, DiagnosticContext, Error, Severity, User,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loom_notifier=debug")),
		)
		.init();

	// API key and endpoints come from BUGSNAG_* variables
	let notifier = Configuration::from_env()
		.app_version("0.1.0")
		.release_stage("development")
		.internal_error_callback(|e| eprintln!("notifier: {e}"))
		.build()?;

	println!("Starting session...");
	let ctx = notifier.start_session(&DiagnosticContext::new()).await;
	let ctx = ctx
		.with_label("example job")
		.with_user(User::with_id("user_example_123").email("example@example.com"))
		.with_breadcrumb(Breadcrumb::new("Application started").with_type(BreadcrumbType::Process))
		.with_breadcrumb(
			Breadcrumb::new("GET /api/data")
				.with_type(BreadcrumbType::Request)
				.with_metadatum("status", 503),
		)
		.with_metadatum("example", "attempt", 1);

	println!("Reporting wrapped error...");
	let err = wrap!(
		&ctx,
		io::Error::new(io::ErrorKind::ConnectionRefused, "upstream unavailable"),
		"fetching {}",
		"/api/data"
	)
	.with_severity(Severity::Warning);
	notifier.notify(&ctx, err).await;

	println!("Reporting captured panic...");
	let payload = std::panic::catch_unwind(|| {
		let values: Vec<u32> = Vec::new();
		values[3]
	})
	.unwrap_err();
	notifier.notify(&ctx, Error::from_panic(&ctx, payload)).await;

	println!("Propagated context: {:?}", notifier.serialize(&ctx));

	notifier.close().await;
	println!("Done.");
	Ok(())
}
