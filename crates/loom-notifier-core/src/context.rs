// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Diagnostic context threaded through an operation.
//!
//! A [`DiagnosticContext`] is an immutable snapshot: every `with_*` method
//! returns a new value and leaves the receiver untouched, so contexts derived
//! from the same parent never observe each other's attachments. The only
//! shared piece is the [`Session`], which is held by reference so that every
//! derived context counts events against the same instance.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::breadcrumb::Breadcrumb;
use crate::error::Result;
use crate::session::Session;

/// Tab name to key/value map, as shown in the dashboard's metadata tabs.
pub type Metadata = BTreeMap<String, BTreeMap<String, Value>>;

/// The user affected by an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

impl User {
	/// Creates a user identified by `id`.
	pub fn with_id(id: impl Into<String>) -> Self {
		Self {
			id: Some(id.into()),
			..Default::default()
		}
	}

	/// Sets the display name.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Sets the email address.
	pub fn email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	/// Returns true if no field is set.
	pub fn is_empty(&self) -> bool {
		self.id.is_none() && self.name.is_none() && self.email.is_none()
	}
}

/// Accumulated diagnostic state at one point in an operation.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticContext {
	label: Option<String>,
	breadcrumbs: Vec<Breadcrumb>,
	user: Option<User>,
	metadata: Metadata,
	session: Option<Arc<Session>>,
}

/// Compact envelope used to propagate a context across process boundaries.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Envelope {
	#[serde(rename = "cx", default, skip_serializing_if = "Option::is_none")]
	label: Option<String>,
	#[serde(rename = "bc", default, skip_serializing_if = "Vec::is_empty")]
	breadcrumbs: Vec<Breadcrumb>,
	#[serde(rename = "us", default, skip_serializing_if = "Option::is_none")]
	user: Option<User>,
	#[serde(rename = "md", default, skip_serializing_if = "BTreeMap::is_empty")]
	metadata: Metadata,
}

impl DiagnosticContext {
	/// Creates an empty context with no session.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a context with `breadcrumb` on top of the stack.
	///
	/// A breadcrumb without a timestamp is stamped with the current time.
	#[must_use]
	pub fn with_breadcrumb(&self, mut breadcrumb: Breadcrumb) -> Self {
		if breadcrumb.timestamp.is_none() {
			breadcrumb.timestamp = Some(Utc::now());
		}
		let mut next = self.clone();
		next.breadcrumbs.insert(0, breadcrumb);
		next
	}

	/// Returns a context reporting `user` as the affected user.
	#[must_use]
	pub fn with_user(&self, user: User) -> Self {
		let mut next = self.clone();
		next.user = Some(user);
		next
	}

	/// Sets the free-text label shown as the event's context in the dashboard.
	#[must_use]
	pub fn with_label(&self, label: impl Into<String>) -> Self {
		let mut next = self.clone();
		next.label = Some(label.into());
		next
	}

	/// Sets a single key in `tab`, keeping the other keys of the tab.
	#[must_use]
	pub fn with_metadatum(
		&self,
		tab: impl Into<String>,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> Self {
		let tab = tab.into();
		let mut data = self.metadata.get(&tab).cloned().unwrap_or_default();
		data.insert(key.into(), value.into());
		self.with_metadata(tab, data)
	}

	/// Replaces the whole of `tab` with `data`.
	#[must_use]
	pub fn with_metadata(&self, tab: impl Into<String>, data: BTreeMap<String, Value>) -> Self {
		let mut next = self.clone();
		next.metadata.insert(tab.into(), data);
		next
	}

	/// Returns a context whose reports count against `session`.
	#[must_use]
	pub fn with_session(&self, session: Arc<Session>) -> Self {
		let mut next = self.clone();
		next.session = Some(session);
		next
	}

	/// Returns the label, if one was attached.
	pub fn label(&self) -> Option<&str> {
		self.label.as_deref()
	}

	/// Breadcrumbs, most recent first.
	pub fn breadcrumbs(&self) -> &[Breadcrumb] {
		&self.breadcrumbs
	}

	/// Returns the affected user, if one was attached.
	pub fn user(&self) -> Option<&User> {
		self.user.as_ref()
	}

	/// Returns the metadata tabs.
	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	/// Returns the session this context reports against.
	pub fn session(&self) -> Option<&Arc<Session>> {
		self.session.as_ref()
	}

	/// Overlays a context captured closer to the failure point.
	///
	/// Label, breadcrumbs, user and session are taken from `deeper` when it
	/// has them and they are non-empty. Metadata is merged per key with
	/// `deeper` winning conflicts.
	#[must_use]
	pub fn merge_from(&self, deeper: &DiagnosticContext) -> Self {
		let mut merged = self.clone();
		if let Some(label) = deeper.label.as_ref().filter(|l| !l.is_empty()) {
			merged.label = Some(label.clone());
		}
		if !deeper.breadcrumbs.is_empty() {
			merged.breadcrumbs = deeper.breadcrumbs.clone();
		}
		if let Some(user) = deeper.user.as_ref().filter(|u| !u.is_empty()) {
			merged.user = Some(user.clone());
		}
		if let Some(session) = &deeper.session {
			merged.session = Some(Arc::clone(session));
		}
		for (tab, kvps) in &deeper.metadata {
			let target = merged.metadata.entry(tab.clone()).or_default();
			for (k, v) in kvps {
				target.insert(k.clone(), v.clone());
			}
		}
		merged
	}

	/// Encodes label, breadcrumbs, user and metadata as base64 JSON.
	///
	/// The session is never part of the encoding.
	pub fn serialize(&self) -> Result<String> {
		let envelope = Envelope {
			label: self.label.clone(),
			breadcrumbs: self.breadcrumbs.clone(),
			user: self.user.clone(),
			metadata: self.metadata.clone(),
		};
		let json = serde_json::to_vec(&envelope)?;
		Ok(STANDARD.encode(json))
	}

	/// Decodes a context produced by [`serialize`](Self::serialize).
	pub fn deserialize(data: &str) -> Result<Self> {
		let json = STANDARD.decode(data.trim())?;
		let envelope: Envelope = serde_json::from_slice(&json)?;
		Ok(Self {
			label: envelope.label,
			breadcrumbs: envelope.breadcrumbs,
			user: envelope.user,
			metadata: envelope.metadata,
			session: None,
		})
	}

	/// Replaces all diagnostic state with the decoded `data`, keeping this
	/// context's session.
	pub fn deserialize_onto(&self, data: &str) -> Result<Self> {
		let mut next = Self::deserialize(data)?;
		next.session = self.session.clone();
		Ok(next)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::breadcrumb::BreadcrumbType;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn test_attach_does_not_mutate_parent() {
		let parent = DiagnosticContext::new().with_label("parent");
		let child = parent
			.with_label("child")
			.with_breadcrumb(Breadcrumb::new("one"))
			.with_metadatum("app", "k", 1);

		assert_eq!(parent.label(), Some("parent"));
		assert!(parent.breadcrumbs().is_empty());
		assert!(parent.metadata().is_empty());
		assert_eq!(child.label(), Some("child"));
	}

	#[test]
	fn test_breadcrumb_gets_timestamp() {
		let ctx = DiagnosticContext::new().with_breadcrumb(Breadcrumb::new("x"));
		assert!(ctx.breadcrumbs()[0].timestamp.is_some());
	}

	#[test]
	fn test_metadatum_keeps_other_keys_in_tab() {
		let ctx = DiagnosticContext::new()
			.with_metadatum("request", "path", "/users")
			.with_metadatum("request", "method", "GET")
			.with_metadatum("request", "path", "/orders");

		let tab = &ctx.metadata()["request"];
		assert_eq!(tab.len(), 2);
		assert_eq!(tab["path"], json!("/orders"));
		assert_eq!(tab["method"], json!("GET"));
	}

	#[test]
	fn test_sibling_contexts_do_not_share_tabs() {
		let base = DiagnosticContext::new().with_metadatum("app", "a", 1);
		let left = base.with_metadatum("app", "b", 2);
		let right = base.with_metadatum("app", "c", 3);

		assert!(!left.metadata()["app"].contains_key("c"));
		assert!(!right.metadata()["app"].contains_key("b"));
		assert_eq!(base.metadata()["app"].len(), 1);
	}

	#[test]
	fn test_with_metadata_replaces_tab() {
		let mut data = BTreeMap::new();
		data.insert("only".to_string(), json!(true));
		let ctx = DiagnosticContext::new()
			.with_metadatum("app", "old", 1)
			.with_metadata("app", data);
		assert_eq!(ctx.metadata()["app"].len(), 1);
		assert!(ctx.metadata()["app"].contains_key("only"));
	}

	#[test]
	fn test_merge_prefers_deeper_values() {
		let outer = DiagnosticContext::new()
			.with_label("outer")
			.with_user(User::with_id("outer-user"))
			.with_breadcrumb(Breadcrumb::new("outer bc"))
			.with_metadatum("shared", "k", "outer")
			.with_metadatum("shared", "only_outer", 1)
			.with_metadatum("outer_tab", "x", 1);
		let inner = DiagnosticContext::new()
			.with_label("inner")
			.with_breadcrumb(Breadcrumb::new("inner bc"))
			.with_metadatum("shared", "k", "inner");

		let merged = outer.merge_from(&inner);
		assert_eq!(merged.label(), Some("inner"));
		assert_eq!(merged.breadcrumbs().len(), 1);
		assert_eq!(merged.breadcrumbs()[0].name, "inner bc");
		assert_eq!(merged.user().and_then(|u| u.id.as_deref()), Some("outer-user"));
		assert_eq!(merged.metadata()["shared"]["k"], json!("inner"));
		assert_eq!(merged.metadata()["shared"]["only_outer"], json!(1));
		assert_eq!(merged.metadata()["outer_tab"]["x"], json!(1));
	}

	#[test]
	fn test_merge_with_empty_keeps_outer() {
		let session = Arc::new(Session::new());
		let outer = DiagnosticContext::new()
			.with_label("outer")
			.with_session(Arc::clone(&session));
		let merged = outer.merge_from(&DiagnosticContext::new().with_label(""));
		assert_eq!(merged.label(), Some("outer"));
		assert!(Arc::ptr_eq(merged.session().unwrap(), &session));
	}

	#[test]
	fn test_merge_ignores_empty_user() {
		let outer = DiagnosticContext::new().with_user(User::with_id("42"));
		let merged = outer.merge_from(&DiagnosticContext::new().with_user(User::default()));
		assert_eq!(merged.user(), Some(&User::with_id("42")));

		let merged = outer.merge_from(&DiagnosticContext::new().with_user(User::default().email("a@b.c")));
		assert_eq!(merged.user().and_then(|u| u.email.as_deref()), Some("a@b.c"));
		assert!(merged.user().unwrap().id.is_none());
		assert!(User::default().is_empty());
	}

	#[test]
	fn test_envelope_uses_short_keys() {
		let ctx = DiagnosticContext::new()
			.with_label("ctx")
			.with_user(User::with_id("1"))
			.with_metadatum("tab", "k", "v");
		let encoded = ctx.serialize().unwrap();
		let raw = STANDARD.decode(encoded).unwrap();
		let json: Value = serde_json::from_slice(&raw).unwrap();
		assert_eq!(json["cx"], "ctx");
		assert_eq!(json["us"]["id"], "1");
		assert_eq!(json["md"]["tab"]["k"], "v");
	}

	#[test]
	fn test_serialize_roundtrip_excludes_session() {
		let ctx = DiagnosticContext::new()
			.with_label("checkout")
			.with_user(User::with_id("123").name("River").email("river@example.com"))
			.with_breadcrumb(Breadcrumb::new("first").with_type(BreadcrumbType::Navigation))
			.with_breadcrumb(Breadcrumb::new("second").with_metadatum("k", "v"))
			.with_metadatum("request", "id", 42)
			.with_session(Arc::new(Session::new()));

		let restored = DiagnosticContext::deserialize(&ctx.serialize().unwrap()).unwrap();
		assert_eq!(restored.label(), ctx.label());
		assert_eq!(restored.user(), ctx.user());
		assert_eq!(restored.breadcrumbs(), ctx.breadcrumbs());
		assert_eq!(restored.metadata(), ctx.metadata());
		assert!(restored.session().is_none());
	}

	#[test]
	fn test_deserialize_onto_keeps_session() {
		let session = Arc::new(Session::new());
		let local = DiagnosticContext::new()
			.with_label("local")
			.with_session(Arc::clone(&session));
		let upstream = DiagnosticContext::new().with_label("upstream");

		let ctx = local.deserialize_onto(&upstream.serialize().unwrap()).unwrap();
		assert_eq!(ctx.label(), Some("upstream"));
		assert!(Arc::ptr_eq(ctx.session().unwrap(), &session));
	}

	#[test]
	fn test_deserialize_rejects_garbage() {
		assert!(DiagnosticContext::deserialize("not base64!!").is_err());
		let not_json = STANDARD.encode(b"nope");
		assert!(DiagnosticContext::deserialize(&not_json).is_err());
	}

	proptest! {
		#[test]
		fn breadcrumbs_are_newest_first(names in proptest::collection::vec("[a-z]{1,8}", 0..20)) {
			let mut ctx = DiagnosticContext::new();
			for name in &names {
				ctx = ctx.with_breadcrumb(Breadcrumb::new(name.clone()));
			}
			prop_assert_eq!(ctx.breadcrumbs().len(), names.len());
			let emitted: Vec<&str> = ctx.breadcrumbs().iter().map(|b| b.name.as_str()).collect();
			let expected: Vec<&str> = names.iter().rev().map(String::as_str).collect();
			prop_assert_eq!(emitted, expected);
		}

		#[test]
		fn latest_metadatum_wins(values in proptest::collection::vec(any::<i64>(), 1..10)) {
			let mut ctx = DiagnosticContext::new().with_metadatum("tab", "other", "kept");
			for v in &values {
				ctx = ctx.with_metadatum("tab", "key", *v);
			}
			let tab = &ctx.metadata()["tab"];
			prop_assert_eq!(&tab["key"], &json!(*values.last().unwrap()));
			prop_assert_eq!(&tab["other"], &json!("kept"));
		}
	}
}
