#![forbid(unsafe_code)]

//! Binding adapters: the collaborator surface.
//!
//! Everything in this module is thin glue between the registry/coordinator
//! core and the three external collaborators the core never owns:
//!
//! - the cache store actually holding query results ([`CacheStore`]);
//! - the UI-binding layer deciding when a query is active ([`QueryHandle`],
//!   an RAII guard: mount registers, drop unregisters);
//! - the remote mutation lifecycle ([`MutationAdapter`]: start / succeed /
//!   fail, with the remote call itself awaited outside this crate).
//!
//! # Invariants
//!
//! 1. A [`QueryHandle`] registers exactly once at mount and unregisters
//!    exactly once on drop — the exactly-once contract the registry trusts
//!    but cannot verify is discharged here by ownership.
//! 2. `read`/`write` are thin closures over the store's `get`/`set`; the
//!    adapter never caches values.
//! 3. [`MutationAdapter::fail`] rolls back before the caller re-surfaces the
//!    remote error (recover locally, then report).
//!
//! # Failure Modes
//!
//! - Dropping a handle whose registry outlived its store is fine: unregister
//!   only touches the registry.
//! - Unmounting mid-flight leaves a change's rollback/sync handle operating
//!   on whatever bindings remain registered under the name; partial
//!   application across components sharing a name is expected.

use std::rc::Rc;

use tracing::debug;

use mirage_core::entity::Entity;
use mirage_core::source::{SourceDescriptor, SourceKind};
use mirage_core::value::StoredValue;

use crate::binding::{ActiveBinding, BindingKind};
use crate::coordinator::{
    ChangeEntry, ChangeError, ChangeState, PendingChange, SequentialTokens, TokenSource,
};
use crate::registry::Registry;

/// The external cache store, at its interface boundary.
///
/// The core reads via `get` and writes via `set`; staleness, eviction, and
/// refetch policy are entirely the store's business.
pub trait CacheStore {
    /// Current value under `key`, or `None` while the query has no data.
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Transform the value under `key` through `updater`.
    fn set(&self, key: &str, updater: &mut dyn FnMut(Option<StoredValue>) -> Option<StoredValue>);
}

/// RAII guard for one mounted query.
///
/// Created when a query becomes active; its binding stays registered until
/// the handle is dropped.
pub struct QueryHandle {
    registry: Registry,
    binding: Rc<ActiveBinding>,
}

impl QueryHandle {
    /// Mount a query described by `descriptor`, backed by `store` at
    /// `cache_key`.
    #[must_use]
    pub fn mount(
        registry: &Registry,
        descriptor: &SourceDescriptor,
        cache_key: impl Into<String>,
        store: Rc<dyn CacheStore>,
    ) -> Self {
        let kind = match descriptor.kind() {
            SourceKind::Collection => BindingKind::Collection,
            SourceKind::Entity => BindingKind::Entity,
        };
        Self::mount_as(registry, kind, descriptor, cache_key, store)
    }

    /// Mount a collection query whose cached shape is paginated.
    ///
    /// The descriptor must be a collection (it supplies the identity
    /// extractor); only the cached representation differs.
    #[must_use]
    pub fn mount_paginated(
        registry: &Registry,
        descriptor: &SourceDescriptor,
        cache_key: impl Into<String>,
        store: Rc<dyn CacheStore>,
    ) -> Self {
        Self::mount_as(
            registry,
            BindingKind::PaginatedCollection,
            descriptor,
            cache_key,
            store,
        )
    }

    fn mount_as(
        registry: &Registry,
        kind: BindingKind,
        descriptor: &SourceDescriptor,
        cache_key: impl Into<String>,
        store: Rc<dyn CacheStore>,
    ) -> Self {
        let cache_key = cache_key.into();
        let read_store = Rc::clone(&store);
        let read_key = cache_key.clone();
        let write_key = cache_key.clone();
        let binding = ActiveBinding::new(
            kind,
            descriptor.name(),
            cache_key,
            descriptor.identify_handle(),
            Box::new(move || read_store.get(&read_key)),
            Box::new(move |updater| store.set(&write_key, updater)),
        );
        registry.register(&binding);
        Self {
            registry: registry.clone(),
            binding,
        }
    }

    /// The registered binding (for tests and advanced adapters).
    #[must_use]
    pub fn binding(&self) -> &Rc<ActiveBinding> {
        &self.binding
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        debug!(name = self.binding.name(), "query unmounting");
        self.registry.unregister(&self.binding);
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("binding", &self.binding)
            .finish()
    }
}

/// Wires the coordinator into a remote mutation's lifecycle.
///
/// The adapter performs no I/O. The caller runs the remote mutate however it
/// likes (the sole suspension point) and reports the outcome:
///
/// ```ignore
/// let adapter = MutationAdapter::new(registry.clone());
/// let mut change = adapter.start(vec![
///     ChangeEntry::new("todos", Instruction::append(draft)).synced(),
/// ])?;
/// match remote_create_todo(&params).await {
///     Ok(created) => { adapter.succeed(&mut change, Some(&created)); }
///     Err(err) => {
///         adapter.fail(&mut change, &err.to_string());
///         return Err(err); // recovered locally, then re-surfaced
///     }
/// }
/// ```
pub struct MutationAdapter<T: TokenSource = SequentialTokens> {
    registry: Registry,
    tokens: T,
}

impl MutationAdapter<SequentialTokens> {
    /// Adapter with the default sequential token source.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            tokens: SequentialTokens::new(),
        }
    }
}

impl<T: TokenSource> MutationAdapter<T> {
    /// Adapter with a caller-supplied token source.
    #[must_use]
    pub fn with_tokens(registry: Registry, tokens: T) -> Self {
        Self { registry, tokens }
    }

    /// Apply a logical change speculatively; the remote call starts after.
    pub fn start(&self, entries: Vec<ChangeEntry>) -> Result<PendingChange, ChangeError> {
        PendingChange::begin(&self.registry, self.tokens.next_token(), entries)
    }

    /// Remote success: sync-replace marked entries with `response`.
    pub fn succeed(&self, change: &mut PendingChange, response: Option<&Entity>) -> ChangeState {
        change.resolve_success(&self.registry, response)
    }

    /// Remote failure: roll back to the pre-change snapshots. The caller
    /// re-surfaces the error itself afterwards.
    ///
    /// Rollback is immediate. A caller that wants the transient `Error`
    /// marker status rendered for a beat calls
    /// [`PendingChange::flag_error`] itself and defers `fail` until the UI
    /// has had its frame.
    pub fn fail(&self, change: &mut PendingChange, message: &str) -> ChangeState {
        debug!(token = %change.token(), message, "remote mutation failed");
        change.resolve_failure()
    }
}

impl<T: TokenSource> std::fmt::Debug for MutationAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationAdapter")
            .field("registry", &self.registry)
            .finish()
    }
}
