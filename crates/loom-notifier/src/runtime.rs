// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host and runtime metadata reported in the device section.

use std::collections::BTreeMap;
use std::sync::Arc;

use loom_notifier_core::Device;
use serde_json::Value;
use tracing::debug;

/// Produces extra device metrics at report time, flattened into `device`.
pub type MetricsSource = Arc<dyn Fn() -> BTreeMap<String, Value> + Send + Sync>;

/// Device keys owned by the fixed fields, never taken from a metrics source.
const RESERVED_DEVICE_KEYS: [&str; 4] = ["hostname", "osName", "osVersion", "runtimeVersions"];

/// Values collected once when the notifier is built.
#[derive(Clone)]
pub struct RuntimeMetadata {
	pub hostname: Option<String>,
	pub os_name: Option<String>,
	pub os_version: Option<String>,
	pub runtime_versions: BTreeMap<String, String>,
	pub metrics: MetricsSource,
}

impl std::fmt::Debug for RuntimeMetadata {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RuntimeMetadata")
			.field("hostname", &self.hostname)
			.field("os_name", &self.os_name)
			.field("os_version", &self.os_version)
			.field("runtime_versions", &self.runtime_versions)
			.finish_non_exhaustive()
	}
}

impl RuntimeMetadata {
	/// Collects metadata from the current host.
	pub fn collect() -> Self {
		let hostname = hostname::get()
			.ok()
			.and_then(|h| h.into_string().ok())
			.filter(|h| !h.is_empty());

		let mut runtime_versions = BTreeMap::new();
		runtime_versions.insert(
			"rustc".to_string(),
			env!("LOOM_NOTIFIER_RUSTC_VERSION").to_string(),
		);

		let metadata = Self {
			hostname,
			os_name: Some(std::env::consts::OS.to_string()),
			os_version: os_version(),
			runtime_versions,
			metrics: Arc::new(default_metrics),
		};
		debug!(
			hostname = ?metadata.hostname,
			os_version = ?metadata.os_version,
			"Collected runtime metadata"
		);
		metadata
	}

	/// Metadata with no host information, for tests and sandboxes.
	pub fn empty() -> Self {
		Self {
			hostname: None,
			os_name: None,
			os_version: None,
			runtime_versions: BTreeMap::new(),
			metrics: Arc::new(BTreeMap::<String, Value>::new),
		}
	}

	/// Sets the source sampled for extra device metrics on every report.
	pub fn with_metrics(mut self, metrics: MetricsSource) -> Self {
		self.metrics = metrics;
		self
	}

	/// Builds the device section, sampling metrics now.
	///
	/// Metrics named like a fixed device field are dropped.
	pub fn device(&self) -> Device {
		let mut metrics = (self.metrics)();
		metrics.retain(|key, _| !RESERVED_DEVICE_KEYS.contains(&key.as_str()));
		Device {
			hostname: self.hostname.clone(),
			os_name: self.os_name.clone(),
			os_version: self.os_version.clone(),
			runtime_versions: self.runtime_versions.clone(),
			metrics,
		}
	}
}

fn default_metrics() -> BTreeMap<String, Value> {
	let mut metrics = BTreeMap::new();
	let cpus = std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1);
	metrics.insert("numCpus".to_string(), Value::from(cpus));
	metrics.insert("arch".to_string(), Value::from(std::env::consts::ARCH));
	metrics
}

#[cfg(unix)]
fn os_version() -> Option<String> {
	std::process::Command::new("uname")
		.arg("-r")
		.output()
		.ok()
		.filter(|out| out.status.success())
		.and_then(|out| String::from_utf8(out.stdout).ok())
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
}

#[cfg(not(unix))]
fn os_version() -> Option<String> {
	None
}
