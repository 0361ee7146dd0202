#![forbid(unsafe_code)]

//! Speculative-change markers.
//!
//! Every item created by a speculative change (Prepend/Append/Replace with
//! full data) is stamped with a [`SpeculativeMarker`] under the reserved
//! [`MARKER_KEY`] object key. The marker's token is unique per *logical
//! change*, not per item, so one batch spanning several targets can later be
//! found and sync-replaced (or error-flagged) as a unit.
//!
//! # Invariants
//!
//! 1. Stamping is non-destructive: only [`MARKER_KEY`] is added or replaced;
//!    all other keys pass through.
//! 2. [`marker_of`] round-trips what [`stamp`] wrote.
//! 3. Markers are ephemeral: a successful sync replaces the stamped item
//!    with the authoritative response (no marker), and rollback restores the
//!    pre-change snapshot (no marker). Nothing persists them.
//!
//! # Failure Modes
//!
//! - Stamping a non-object item is a no-op clone (nowhere to put the key).
//! - A malformed marker blob reads back as `None`, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;

/// Reserved object key carrying the marker on stamped items.
pub const MARKER_KEY: &str = "__mirage__";

/// Identifier binding together all items produced by one logical change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

impl ChangeToken {
    /// Wrap a caller-supplied token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ChangeToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status a UI may render next to a speculative item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Remote write in flight.
    Pending,
    /// Remote write succeeded (item kept as committed speculative state).
    Success,
    /// Remote write failed; rollback will remove the marker shortly.
    Error,
}

/// Marker attached to items produced by a speculative change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeculativeMarker {
    /// Token shared by every item of the originating logical change.
    pub token: ChangeToken,
    /// Current lifecycle status.
    pub status: ChangeStatus,
    /// Human-readable failure detail, set only alongside [`ChangeStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SpeculativeMarker {
    /// Marker for a freshly-applied, in-flight change.
    #[must_use]
    pub fn pending(token: ChangeToken) -> Self {
        Self {
            token,
            status: ChangeStatus::Pending,
            error_message: None,
        }
    }
}

/// Return a copy of `item` carrying `marker` under [`MARKER_KEY`].
#[must_use]
pub fn stamp(item: &Entity, marker: &SpeculativeMarker) -> Entity {
    match item {
        Value::Object(map) => {
            let mut stamped = map.clone();
            // Serializing a plain struct of strings cannot fail.
            let blob = serde_json::to_value(marker).unwrap_or(Value::Null);
            stamped.insert(MARKER_KEY.to_owned(), blob);
            Value::Object(stamped)
        }
        other => other.clone(),
    }
}

/// Read the marker off an item, if one is present and well-formed.
#[must_use]
pub fn marker_of(item: &Entity) -> Option<SpeculativeMarker> {
    let blob = item.get(MARKER_KEY)?;
    serde_json::from_value(blob.clone()).ok()
}

/// Whether `item` carries a marker with the given token.
#[must_use]
pub fn carries_token(item: &Entity, token: &ChangeToken) -> bool {
    marker_of(item).is_some_and(|m| &m.token == token)
}

/// Return a copy of `item` with its marker's status (and message) rewritten.
///
/// Items without a marker pass through unchanged.
#[must_use]
pub fn with_status(item: &Entity, status: ChangeStatus, message: Option<String>) -> Entity {
    match marker_of(item) {
        Some(mut marker) => {
            marker.status = status;
            marker.error_message = message;
            stamp(item, &marker)
        }
        None => item.clone(),
    }
}

/// Return a copy of `item` with the marker key removed.
#[must_use]
pub fn strip_marker(item: &Entity) -> Entity {
    match item {
        Value::Object(map) => {
            let mut stripped = map.clone();
            stripped.remove(MARKER_KEY);
            Value::Object(stripped)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending(token: &str) -> SpeculativeMarker {
        SpeculativeMarker::pending(ChangeToken::from(token))
    }

    #[test]
    fn stamp_and_read_back() {
        let item = json!({"id": "1", "name": "draft"});
        let stamped = stamp(&item, &pending("t-1"));
        let marker = marker_of(&stamped).expect("marker present");
        assert_eq!(marker.token, ChangeToken::from("t-1"));
        assert_eq!(marker.status, ChangeStatus::Pending);
        assert_eq!(marker.error_message, None);
        // Original keys untouched.
        assert_eq!(stamped["id"], "1");
        assert_eq!(stamped["name"], "draft");
    }

    #[test]
    fn stamp_non_object_is_noop() {
        let item = json!("scalar");
        assert_eq!(stamp(&item, &pending("t")), item);
        assert_eq!(marker_of(&item), None);
    }

    #[test]
    fn carries_token_distinguishes_changes() {
        let stamped = stamp(&json!({"id": "1"}), &pending("t-a"));
        assert!(carries_token(&stamped, &ChangeToken::from("t-a")));
        assert!(!carries_token(&stamped, &ChangeToken::from("t-b")));
        assert!(!carries_token(&json!({"id": "1"}), &ChangeToken::from("t-a")));
    }

    #[test]
    fn with_status_rewrites_in_place() {
        let stamped = stamp(&json!({"id": "1"}), &pending("t"));
        let flagged = with_status(&stamped, ChangeStatus::Error, Some("boom".into()));
        let marker = marker_of(&flagged).expect("marker kept");
        assert_eq!(marker.status, ChangeStatus::Error);
        assert_eq!(marker.error_message.as_deref(), Some("boom"));
        assert_eq!(marker.token, ChangeToken::from("t"));
    }

    #[test]
    fn with_status_without_marker_is_noop() {
        let item = json!({"id": "1"});
        assert_eq!(with_status(&item, ChangeStatus::Error, None), item);
    }

    #[test]
    fn strip_marker_removes_only_marker() {
        let stamped = stamp(&json!({"id": "1", "v": 2}), &pending("t"));
        assert_eq!(strip_marker(&stamped), json!({"id": "1", "v": 2}));
    }

    #[test]
    fn malformed_marker_reads_as_none() {
        let item = json!({"id": "1", "__mirage__": "not a marker"});
        assert_eq!(marker_of(&item), None);
    }
}
