#![forbid(unsafe_code)]

//! Cached value shapes.
//!
//! [`StoredValue`] is the closed union of everything a binding can hold:
//! a flat collection, a single entity, or a paginated collection. The enum is
//! matched exhaustively throughout the engine and registry; adding a shape
//! means extending the enum and letting the compiler point at every match.
//!
//! Pages are reference-counted ([`Page`]) so that applying an instruction to
//! a paginated value — which only ever touches page zero — clones one page
//! and shares the rest. `Rc::ptr_eq` on untouched pages is the observable
//! guarantee tests lean on.

use std::rc::Rc;

use crate::entity::Entity;

/// One page of a paginated collection, shared by reference count.
pub type Page = Rc<Vec<Entity>>;

/// A value as held by the external cache store for one binding.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    /// Ordered sequence of entities.
    Collection(Vec<Entity>),
    /// A single entity.
    Single(Entity),
    /// Ordered pages, each an ordered sequence of entities.
    Pages(Vec<Page>),
}

impl StoredValue {
    /// Build a collection value from items.
    #[must_use]
    pub fn collection(items: impl IntoIterator<Item = Entity>) -> Self {
        Self::Collection(items.into_iter().collect())
    }

    /// Build a single-entity value.
    #[must_use]
    pub fn single(entity: Entity) -> Self {
        Self::Single(entity)
    }

    /// Build a paginated value from per-page item vectors.
    #[must_use]
    pub fn pages(pages: impl IntoIterator<Item = Vec<Entity>>) -> Self {
        Self::Pages(pages.into_iter().map(Rc::new).collect())
    }

    /// The collection items, if this is a collection.
    #[must_use]
    pub fn as_collection(&self) -> Option<&[Entity]> {
        match self {
            Self::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// The entity, if this is a single value.
    #[must_use]
    pub fn as_single(&self) -> Option<&Entity> {
        match self {
            Self::Single(entity) => Some(entity),
            _ => None,
        }
    }

    /// The pages, if this is a paginated value.
    #[must_use]
    pub fn as_pages(&self) -> Option<&[Page]> {
        match self {
            Self::Pages(pages) => Some(pages),
            _ => None,
        }
    }

    /// Total number of entities across all shapes.
    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            Self::Collection(items) => items.len(),
            Self::Single(_) => 1,
            Self::Pages(pages) => pages.iter().map(|p| p.len()).sum(),
        }
    }
}
