#![forbid(unsafe_code)]

//! Test harness for Mirage integrations.
//!
//! Provides the pieces every registry/coordinator test needs: an in-memory
//! [`CacheStore`], entity fixtures, and one-line mounting helpers. Production
//! binding layers implement their own store over whatever cache they front;
//! this one exists so tests read like the scenarios they check.
//!
//! ```ignore
//! let registry = Registry::new();
//! let store = MemoryStore::new();
//! store.seed("todos?all", collection(todos(1..=2)));
//!
//! let _q = mount_collection(&registry, "todos", "todos?all", &store);
//! let _ = registry.apply_update("todos", &Instruction::append(todo(3)));
//! assert_eq!(store.snapshot("todos?all").unwrap().item_count(), 3);
//! ```

use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::json;
use tracing::trace;

use mirage_core::entity::{Entity, identify_by};
use mirage_core::source::SourceDescriptor;
use mirage_core::value::StoredValue;
use mirage_runtime::adapter::{CacheStore, QueryHandle};
use mirage_runtime::registry::Registry;

/// In-memory cache store: a keyed map of [`StoredValue`]s.
///
/// Cloneable handle over shared cells, mirroring how the runtime shares its
/// registry. Writing `None` removes the key (the query "loses" its data).
#[derive(Clone, Default)]
pub struct MemoryStore {
    cells: Rc<RefCell<AHashMap<String, StoredValue>>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `key`, as if a fetch had completed.
    pub fn seed(&self, key: impl Into<String>, value: StoredValue) {
        self.cells.borrow_mut().insert(key.into(), value);
    }

    /// Current value under `key`.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<StoredValue> {
        self.cells.borrow().get(key).cloned()
    }

    /// Number of keys holding data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    /// Whether no keys hold data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }

    /// Share this store as a `CacheStore` trait object.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn CacheStore> {
        Rc::new(self.clone())
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.cells.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, updater: &mut dyn FnMut(Option<StoredValue>) -> Option<StoredValue>) {
        let current = self.cells.borrow().get(key).cloned();
        let next = updater(current);
        trace!(key, present = next.is_some(), "store write");
        match next {
            Some(value) => {
                self.cells.borrow_mut().insert(key.to_owned(), value);
            }
            None => {
                self.cells.borrow_mut().remove(key);
            }
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.cells.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A todo entity with a string id and a title derived from it.
#[must_use]
pub fn todo(n: u32) -> Entity {
    json!({"id": n.to_string(), "title": format!("todo {n}"), "done": false})
}

/// Consecutive todo entities.
#[must_use]
pub fn todos(range: RangeInclusive<u32>) -> Vec<Entity> {
    range.map(todo).collect()
}

/// Wrap items as a collection value.
#[must_use]
pub fn collection(items: Vec<Entity>) -> StoredValue {
    StoredValue::Collection(items)
}

/// Wrap per-page item vectors as a paginated value.
#[must_use]
pub fn pages(pages: Vec<Vec<Entity>>) -> StoredValue {
    StoredValue::pages(pages)
}

// ---------------------------------------------------------------------------
// Mounting helpers
// ---------------------------------------------------------------------------

/// Mount a collection query (`identify` by `"id"`) over `store`.
#[must_use]
pub fn mount_collection(
    registry: &Registry,
    name: &str,
    cache_key: &str,
    store: &MemoryStore,
) -> QueryHandle {
    let descriptor = SourceDescriptor::collection(name, identify_by("id"));
    QueryHandle::mount(registry, &descriptor, cache_key, store.handle())
}

/// Mount a single-entity query over `store`.
#[must_use]
pub fn mount_entity(
    registry: &Registry,
    name: &str,
    cache_key: &str,
    store: &MemoryStore,
) -> QueryHandle {
    let descriptor = SourceDescriptor::entity(name);
    QueryHandle::mount(registry, &descriptor, cache_key, store.handle())
}

/// Mount a paginated collection query (`identify` by `"id"`) over `store`.
#[must_use]
pub fn mount_paginated(
    registry: &Registry,
    name: &str,
    cache_key: &str,
    store: &MemoryStore,
) -> QueryHandle {
    let descriptor = SourceDescriptor::collection(name, identify_by("id"));
    QueryHandle::mount_paginated(registry, &descriptor, cache_key, store.handle())
}
