#![forbid(unsafe_code)]

//! The active-query registry.
//!
//! [`Registry`] is the mutable index from data-source name to the set of
//! currently-active bindings. It is a cloneable handle over shared
//! single-threaded state (`Rc<RefCell<..>>`) — constructed explicitly and
//! passed into adapters and coordinators, never looked up ambiently, so
//! tests build isolated registries freely.
//!
//! # Invariants
//!
//! 1. Buckets preserve registration order; updates and rollback capture scan
//!    bindings in that order.
//! 2. Set semantics by pointer identity: re-registering the same `Rc` is a
//!    no-op; distinct bindings sharing a name all receive updates.
//! 3. An empty bucket is removed on unregister — no unbounded growth of
//!    empty name entries.
//! 4. [`bindings_for`](Registry::bindings_for) returns a snapshot; later
//!    registry mutation does not affect a previously returned vec.
//! 5. [`apply_update`](Registry::apply_update) is the only operation with
//!    observable side effects: it writes every matching binding
//!    synchronously, in registration order, before returning.
//!
//! # Failure Modes
//!
//! - Updating a name with no bindings returns an empty [`RollbackSet`]; a
//!   speculative update against a not-yet-mounted view is a harmless no-op.
//! - A binding whose `read()` is absent is skipped for apply but still
//!   captured in the rollback set (its restore re-writes `None`).
//! - A stored value whose shape disagrees with the binding's kind is left
//!   unchanged and logged; the rollback entry is still captured.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, trace, warn};

use mirage_core::engine;
use mirage_core::instruction::Instruction;

use crate::binding::ActiveBinding;
use crate::rollback::RollbackSet;

#[derive(Default)]
struct Inner {
    buckets: AHashMap<String, Vec<Rc<ActiveBinding>>>,
}

/// Cloneable handle to the shared binding index.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Rc<RefCell<Inner>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `binding` to its name's bucket.
    ///
    /// Idempotent under pointer identity: registering the same `Rc` twice is
    /// a no-op. Distinct bindings sharing a name are all kept and all
    /// receive updates.
    pub fn register(&self, binding: &Rc<ActiveBinding>) {
        let mut inner = self.inner.borrow_mut();
        let bucket = inner.buckets.entry(binding.name().to_owned()).or_default();
        if bucket.iter().any(|b| ActiveBinding::same(b, binding)) {
            trace!(name = binding.name(), "binding already registered");
            return;
        }
        bucket.push(Rc::clone(binding));
        debug!(
            name = binding.name(),
            kind = binding.kind().label(),
            cache_key = binding.cache_key(),
            active = bucket.len(),
            "registered binding"
        );
    }

    /// Remove `binding` from its name's bucket, dropping the bucket when it
    /// empties. Unknown bindings are ignored.
    pub fn unregister(&self, binding: &Rc<ActiveBinding>) {
        let mut inner = self.inner.borrow_mut();
        let Some(bucket) = inner.buckets.get_mut(binding.name()) else {
            trace!(name = binding.name(), "unregister: no bucket");
            return;
        };
        let before = bucket.len();
        bucket.retain(|b| !ActiveBinding::same(b, binding));
        let removed = before - bucket.len();
        if bucket.is_empty() {
            inner.buckets.remove(binding.name());
        }
        if removed > 0 {
            debug!(name = binding.name(), "unregistered binding");
        } else {
            trace!(name = binding.name(), "unregister: binding not present");
        }
    }

    /// Snapshot of the bindings currently registered under `name`.
    ///
    /// Detached: mutating the registry afterwards does not change the
    /// returned vec.
    #[must_use]
    pub fn bindings_for(&self, name: &str) -> Vec<Rc<ActiveBinding>> {
        self.inner
            .borrow()
            .buckets
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of bindings registered under `name`.
    #[must_use]
    pub fn binding_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .buckets
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Apply `instruction` to every binding registered under `name`.
    ///
    /// Per binding, in registration order: capture `read()` as the snapshot,
    /// push a restore action writing that snapshot back, then — if the
    /// snapshot is present and shape-compatible — write the engine's result
    /// through the binding. Returns the rollback set in scan order.
    ///
    /// An unknown `name` returns an empty set; not an error.
    pub fn apply_update(&self, name: &str, instruction: &Instruction) -> RollbackSet {
        // Snapshot the bucket first so store writes can't re-enter a borrow.
        let bindings = self.bindings_for(name);
        let mut rollback = RollbackSet::new();
        if bindings.is_empty() {
            trace!(name, action = instruction.action(), "no active bindings");
            return rollback;
        }

        debug!(
            name,
            action = instruction.action(),
            bindings = bindings.len(),
            "applying speculative update"
        );
        for binding in &bindings {
            let snapshot = binding.read();

            let restore_binding = Rc::clone(binding);
            let restore_value = snapshot.clone();
            rollback.push(move || restore_binding.store(restore_value.clone()));

            match snapshot {
                Some(value) if binding.kind().accepts(&value) => {
                    let next = engine::apply(&value, instruction, binding.identify());
                    binding.store(Some(next));
                    trace!(
                        name,
                        cache_key = binding.cache_key(),
                        kind = binding.kind().label(),
                        "binding updated"
                    );
                }
                Some(_) => {
                    warn!(
                        name,
                        cache_key = binding.cache_key(),
                        kind = binding.kind().label(),
                        "stored value shape disagrees with binding kind; left unchanged"
                    );
                }
                None => {
                    trace!(
                        name,
                        cache_key = binding.cache_key(),
                        "binding absent; rollback captured, apply skipped"
                    );
                }
            }
        }
        rollback
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("names", &inner.buckets.len())
            .field(
                "bindings",
                &inner.buckets.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
