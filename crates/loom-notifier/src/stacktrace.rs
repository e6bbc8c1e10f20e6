// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stacktrace capture and frame classification.

use loom_notifier_core::StackFrame;

/// Maximum number of frames captured per stacktrace.
pub const MAX_FRAMES: usize = 50;

/// Symbol prefix of this library's own frames.
const LIBRARY_PREFIX: &str = "loom_notifier::";

/// Captures the current call stack, innermost frame first.
///
/// Frames up to and including the last frame belonging to this library are
/// dropped, so the result begins at the caller. A frame is in project when
/// its function lives in `project_module` (a crate name such as `my_app`) or
/// is the program's `main`.
pub fn capture(project_module: &str) -> Vec<StackFrame> {
	let mut frames = Vec::with_capacity(MAX_FRAMES);

	backtrace::trace(|frame| {
		let mut resolved = false;
		backtrace::resolve_frame(frame, |symbol| {
			if frames.len() >= MAX_FRAMES {
				return;
			}
			resolved = true;
			let method = symbol
				.name()
				.map(|name| format!("{name:#}"))
				.unwrap_or_else(|| "unknown".to_string());
			let file = symbol
				.filename()
				.map(|path| path.display().to_string())
				.unwrap_or_else(|| "unknown".to_string());
			frames.push(make_frame(file, symbol.lineno().unwrap_or(0), method, project_module));
		});

		if !resolved && frames.len() < MAX_FRAMES {
			frames.push(make_frame(
				"unknown".to_string(),
				0,
				"unknown".to_string(),
				project_module,
			));
		}
		frames.len() < MAX_FRAMES
	});

	strip_library_frames(frames)
}

fn make_frame(file: String, line_number: u32, method: String, project_module: &str) -> StackFrame {
	let in_project = is_in_project(&method, project_module);
	StackFrame {
		file,
		line_number,
		method,
		in_project,
	}
}

/// Drops every frame up to and including the last library frame.
pub(crate) fn strip_library_frames(mut frames: Vec<StackFrame>) -> Vec<StackFrame> {
	match frames.iter().rposition(|f| is_library_frame(&f.method)) {
		Some(last) => frames.split_off(last + 1),
		None => frames,
	}
}

fn is_library_frame(method: &str) -> bool {
	method.trim_start_matches('<').starts_with(LIBRARY_PREFIX)
}

/// Returns true if `method` belongs to `project_module` or is the program
/// entry point. An empty module only matches the entry point.
pub fn is_in_project(method: &str, project_module: &str) -> bool {
	(!project_module.is_empty() && mentions_crate(method, project_module)) || is_entry_point(method)
}

/// Checks for `module::` at a path-segment boundary, so that `my_app` does
/// not match `not_my_app::`.
fn mentions_crate(method: &str, module: &str) -> bool {
	let needle = format!("{module}::");
	method.match_indices(&needle).any(|(idx, _)| {
		method[..idx]
			.chars()
			.next_back()
			.map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
	})
}

/// `my_app::main`, including the closures generated by async main macros.
fn is_entry_point(method: &str) -> bool {
	let mut path = method;
	while let Some(stripped) = path.strip_suffix("::{{closure}}") {
		path = stripped;
	}
	let segments: Vec<&str> = path.split("::").collect();
	segments.len() == 2 && segments[1] == "main" && !segments[0].is_empty()
}
