#![forbid(unsafe_code)]

//! Immutable data-source descriptors.
//!
//! A [`SourceDescriptor`] names a logical data source and says whether it is
//! a collection (ordered entities with an identity extractor) or a single
//! entity. Descriptors are pure value objects created once at application
//! start; the `name` is the join key the registry uses to find every active
//! binding for a target.
//!
//! Uniqueness of `name` per kind is assumed, not enforced: registering
//! several descriptors sharing a name is deliberate (one logical source
//! rendered by several components), and all of them update together.

use std::rc::Rc;

use crate::entity::IdentifyFn;

/// The shape of a data source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Ordered sequence of entities sharing an identity extractor.
    Collection,
    /// A single named value with no identity extractor.
    Entity,
}

/// Immutable descriptor of a named data source.
#[derive(Clone)]
pub struct SourceDescriptor {
    kind: SourceKind,
    name: String,
    identify: Option<IdentifyFn>,
}

impl SourceDescriptor {
    /// Describe a collection source. `identify` extracts item identities.
    #[must_use]
    pub fn collection(name: impl Into<String>, identify: IdentifyFn) -> Self {
        Self {
            kind: SourceKind::Collection,
            name: name.into(),
            identify: Some(identify),
        }
    }

    /// Describe a single-entity source.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Entity,
            name: name.into(),
            identify: None,
        }
    }

    /// The source kind.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The join key matching this source to active bindings.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity extractor (`Some` for collections, `None` for entities).
    #[must_use]
    pub fn identify(&self) -> Option<&IdentifyFn> {
        self.identify.as_ref()
    }

    /// Clone the identity extractor handle for a binding.
    #[must_use]
    pub fn identify_handle(&self) -> Option<IdentifyFn> {
        self.identify.as_ref().map(Rc::clone)
    }
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("identify", &self.identify.as_ref().map(|_| "fn"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::identify_by;
    use serde_json::json;

    #[test]
    fn collection_descriptor_carries_identify() {
        let desc = SourceDescriptor::collection("todos", identify_by("id"));
        assert_eq!(desc.kind(), SourceKind::Collection);
        assert_eq!(desc.name(), "todos");
        let identify = desc.identify().expect("collection has identify");
        assert_eq!(identify(&json!({"id": "3"})), Some("3".into()));
    }

    #[test]
    fn entity_descriptor_has_no_identify() {
        let desc = SourceDescriptor::entity("profile");
        assert_eq!(desc.kind(), SourceKind::Entity);
        assert!(desc.identify().is_none());
    }

    #[test]
    fn descriptors_sharing_a_name_are_independent_values() {
        let a = SourceDescriptor::collection("todos", identify_by("id"));
        let b = SourceDescriptor::collection("todos", identify_by("uuid"));
        assert_eq!(a.name(), b.name());
    }
}
