#![forbid(unsafe_code)]

//! Mirage: speculative cache updates with guaranteed rollback.
//!
//! Declare named data sources, mount queries against an external cache
//! store, and apply speculative mutations that every active view sees
//! immediately — with exactly one of three outcomes per change: sync-replace
//! with the server's authoritative response, commit as-is, or rollback to
//! the pre-change snapshots.
//!
//! This crate is the facade: `mirage-core` holds the pure data model and
//! merge engine, `mirage-runtime` the registry, coordinator, and adapters.
//!
//! ```ignore
//! use mirage::prelude::*;
//!
//! let registry = Registry::new();
//! let todos = SourceDescriptor::collection("todos", identify_by("id"));
//! let handle = QueryHandle::mount(&registry, &todos, "todos?all", store);
//!
//! let adapter = MutationAdapter::new(registry.clone());
//! let mut change = adapter.start(vec![
//!     ChangeEntry::new("todos", Instruction::prepend(draft)).synced(),
//! ])?;
//! // ... await the remote write, then:
//! adapter.succeed(&mut change, Some(&created));
//! ```

pub use mirage_core::{
    Entity, EntityId, Instruction, Patch, Selector, SourceDescriptor, SourceKind, StoredValue,
    apply, identify_by, shallow_merge,
};
pub use mirage_core::engine;
pub use mirage_core::marker::{self, ChangeStatus, ChangeToken, SpeculativeMarker};
pub use mirage_runtime::{
    ActiveBinding, BindingKind, CacheStore, ChangeEntry, ChangeError, ChangeState,
    MutationAdapter, PendingChange, QueryHandle, Registry, RollbackSet, SequentialTokens,
    TokenSource,
};

/// Everything a binding layer typically imports.
pub mod prelude {
    pub use mirage_runtime::prelude::*;
}
