#![forbid(unsafe_code)]

//! Entity value model.
//!
//! Cached items are schemaless JSON objects ([`serde_json::Value`]); the
//! application layer decides their shape. The only structure this crate
//! imposes is identity: collections carry an [`IdentifyFn`] that extracts an
//! [`EntityId`] from an item so instructions can address it.
//!
//! # Invariants
//!
//! 1. [`identify_by`] returns `None` for non-object items and for missing or
//!    non-scalar id fields — it never panics.
//! 2. [`shallow_merge`] merges one key level deep: keys in `partial` replace
//!    keys in `base` wholesale, nested objects are not merged recursively.
//! 3. If either side of a merge is not an object, the partial wins wholesale
//!    (matching spread semantics on degenerate input).

use std::rc::Rc;

use serde_json::Value;

/// A cached item. Object-shaped by convention; the engine tolerates anything.
pub type Entity = Value;

/// Identity extracted from an entity, used for `Selector::by_id` matching.
pub type EntityId = String;

/// Extracts the identity of an entity, if it has one.
///
/// `Rc` so descriptors, bindings, and instructions can share one extractor
/// in a single-threaded world.
pub type IdentifyFn = Rc<dyn Fn(&Entity) -> Option<EntityId>>;

/// Build an [`IdentifyFn`] reading a top-level object key.
///
/// String ids are taken as-is; numeric ids are stringified so `1` and `"1"`
/// address the same item.
///
/// ```
/// use mirage_core::entity::identify_by;
/// use serde_json::json;
///
/// let identify = identify_by("id");
/// assert_eq!(identify(&json!({"id": "a7"})), Some("a7".to_string()));
/// assert_eq!(identify(&json!({"id": 12})), Some("12".to_string()));
/// assert_eq!(identify(&json!("not an object")), None);
/// ```
#[must_use]
pub fn identify_by(key: impl Into<String>) -> IdentifyFn {
    let key = key.into();
    Rc::new(move |entity: &Entity| match entity.get(&key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Shallow merge of `partial` into `base` (`{...base, ...partial}`).
///
/// Both inputs are borrowed; the result is a fresh value.
#[must_use]
pub fn shallow_merge(base: &Entity, partial: &Entity) -> Entity {
    match (base, partial) {
        (Value::Object(b), Value::Object(p)) => {
            let mut merged = b.clone();
            for (k, v) in p {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        // Degenerate input: the partial wins wholesale.
        _ => partial.clone(),
    }
}
