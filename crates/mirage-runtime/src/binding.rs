#![forbid(unsafe_code)]

//! Active query bindings.
//!
//! An [`ActiveBinding`] represents one live, mounted query result: a name
//! joining it to a data source, a cache key saying where the external store
//! holds its data, and `read`/`write` closures over that store. Bindings are
//! created when a query becomes active and discarded when it unmounts; the
//! registry holds them as `Rc`s and compares by pointer identity, never by
//! content.
//!
//! # Invariants
//!
//! 1. `read` and `write` are thin closures over the external store's
//!    `get`/`set`; the binding holds no cached copy of the value.
//! 2. Two bindings are "the same" only when their `Rc`s point at the same
//!    allocation ([`ActiveBinding::same`]).
//! 3. The binding carries the identity extractor of its descriptor so the
//!    engine can match id selectors without reaching back to the descriptor.

use std::rc::Rc;

use mirage_core::entity::IdentifyFn;
use mirage_core::value::StoredValue;

/// Shape of the value a binding holds, driving engine dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// Flat ordered collection.
    Collection,
    /// Single entity value.
    Entity,
    /// Ordered pages of entities; edits target page zero.
    PaginatedCollection,
}

impl BindingKind {
    /// Whether `value` has the shape this binding expects.
    #[must_use]
    pub fn accepts(&self, value: &StoredValue) -> bool {
        matches!(
            (self, value),
            (Self::Collection, StoredValue::Collection(_))
                | (Self::Entity, StoredValue::Single(_))
                | (Self::PaginatedCollection, StoredValue::Pages(_))
        )
    }

    /// Short label for logging.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Entity => "entity",
            Self::PaginatedCollection => "paginated",
        }
    }
}

/// Reads the binding's current value from the external store.
///
/// `None` means the query has not produced data yet (absent).
pub type ReadFn = Box<dyn Fn() -> Option<StoredValue>>;

/// Writes through the external store by transforming the current value.
pub type WriteFn = Box<dyn Fn(&mut dyn FnMut(Option<StoredValue>) -> Option<StoredValue>)>;

/// One live, mounted query result.
pub struct ActiveBinding {
    kind: BindingKind,
    name: String,
    cache_key: String,
    identify: Option<IdentifyFn>,
    read: ReadFn,
    write: WriteFn,
}

impl ActiveBinding {
    /// Create a binding. Returns an `Rc` because pointer identity *is* the
    /// binding's identity for register/unregister purposes.
    #[must_use]
    pub fn new(
        kind: BindingKind,
        name: impl Into<String>,
        cache_key: impl Into<String>,
        identify: Option<IdentifyFn>,
        read: ReadFn,
        write: WriteFn,
    ) -> Rc<Self> {
        Rc::new(Self {
            kind,
            name: name.into(),
            cache_key: cache_key.into(),
            identify,
            read,
            write,
        })
    }

    /// The value shape this binding holds.
    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// The source name joining this binding to update targets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque key locating this binding's data in the external store.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Identity extractor inherited from the descriptor, if any.
    #[must_use]
    pub fn identify(&self) -> Option<&IdentifyFn> {
        self.identify.as_ref()
    }

    /// Read the current value from the store. `None` while the query has no
    /// data.
    #[must_use]
    pub fn read(&self) -> Option<StoredValue> {
        (self.read)()
    }

    /// Write through the store by transforming the current value.
    pub fn write(&self, mut f: impl FnMut(Option<StoredValue>) -> Option<StoredValue>) {
        (self.write)(&mut f);
    }

    /// Overwrite the stored value outright (rollback restore path).
    pub fn store(&self, value: Option<StoredValue>) {
        (self.write)(&mut |_| value.clone());
    }

    /// Pointer-identity comparison.
    #[must_use]
    pub fn same(a: &Rc<Self>, b: &Rc<Self>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

impl std::fmt::Debug for ActiveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveBinding")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    fn cell_binding(name: &str) -> (Rc<ActiveBinding>, Rc<RefCell<Option<StoredValue>>>) {
        let cell = Rc::new(RefCell::new(Some(StoredValue::collection([
            json!({"id": "1"}),
        ]))));
        let read_cell = Rc::clone(&cell);
        let write_cell = Rc::clone(&cell);
        let binding = ActiveBinding::new(
            BindingKind::Collection,
            name,
            format!("key:{name}"),
            None,
            Box::new(move || read_cell.borrow().clone()),
            Box::new(move |f| {
                let current = write_cell.borrow().clone();
                *write_cell.borrow_mut() = f(current);
            }),
        );
        (binding, cell)
    }

    #[test]
    fn read_and_write_round_trip_through_store() {
        let (binding, cell) = cell_binding("todos");
        assert_eq!(binding.read().map(|v| v.item_count()), Some(1));

        binding.write(|current| {
            let mut v = current.unwrap().as_collection().unwrap().to_vec();
            v.push(json!({"id": "2"}));
            Some(StoredValue::Collection(v))
        });
        assert_eq!(cell.borrow().as_ref().map(StoredValue::item_count), Some(2));
    }

    #[test]
    fn store_overwrites_unconditionally() {
        let (binding, cell) = cell_binding("todos");
        binding.store(None);
        assert_eq!(*cell.borrow(), None);

        binding.store(Some(StoredValue::single(json!({"id": "9"}))));
        assert_eq!(
            *cell.borrow(),
            Some(StoredValue::single(json!({"id": "9"})))
        );
    }

    #[test]
    fn same_is_pointer_identity() {
        let (a, _) = cell_binding("todos");
        let (b, _) = cell_binding("todos");
        assert!(ActiveBinding::same(&a, &a.clone()));
        assert!(!ActiveBinding::same(&a, &b), "equal content is not identity");
    }

    #[test]
    fn kind_accepts_matching_shapes_only() {
        let coll = StoredValue::collection([]);
        let single = StoredValue::single(json!(1));
        let pages = StoredValue::pages([vec![]]);
        assert!(BindingKind::Collection.accepts(&coll));
        assert!(!BindingKind::Collection.accepts(&single));
        assert!(BindingKind::Entity.accepts(&single));
        assert!(!BindingKind::Entity.accepts(&pages));
        assert!(BindingKind::PaginatedCollection.accepts(&pages));
        assert!(!BindingKind::PaginatedCollection.accepts(&coll));
    }
}
