// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Command;

fn main() {
	let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown".to_string());
	let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "unknown".to_string());
	println!("cargo:rustc-env=LOOM_NOTIFIER_PLATFORM={os}-{arch}");

	let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
	let version = Command::new(rustc)
		.arg("--version")
		.output()
		.ok()
		.and_then(|out| String::from_utf8(out.stdout).ok())
		.and_then(|s| s.split_whitespace().nth(1).map(str::to_string))
		.unwrap_or_else(|| "unknown".to_string());
	println!("cargo:rustc-env=LOOM_NOTIFIER_RUSTC_VERSION={version}");
	println!("cargo:rerun-if-changed=build.rs");
}
