#![forbid(unsafe_code)]

//! Runtime half of Mirage: the live machinery around the pure engine.
//!
//! - [`binding`]: [`ActiveBinding`] — a mounted query's read/write handle
//!   into the external cache store.
//! - [`registry`]: [`Registry`] — the process-wide index from source name to
//!   active bindings, and `apply_update`, the one operation with side
//!   effects.
//! - [`rollback`]: [`RollbackSet`] — ordered restore closures over full
//!   pre-change snapshots.
//! - [`coordinator`]: [`PendingChange`] — one logical speculative change
//!   from begin through sync/commit/rollback.
//! - [`adapter`]: the collaborator surface — [`CacheStore`], RAII
//!   [`QueryHandle`] mounting, and [`MutationAdapter`] lifecycle glue.
//!
//! # Concurrency model
//!
//! Single-threaded and cooperative, the same `Rc`/`RefCell` discipline as the
//! rest of the codebase: no locks, no atomics, correctness by event-loop
//! serialization. The sole suspension point — the remote call itself — lives
//! outside this crate entirely.

pub mod adapter;
pub mod binding;
pub mod coordinator;
pub mod registry;
pub mod rollback;

pub use adapter::{CacheStore, MutationAdapter, QueryHandle};
pub use binding::{ActiveBinding, BindingKind};
pub use coordinator::{
    ChangeEntry, ChangeError, ChangeState, PendingChange, SequentialTokens, TokenSource,
};
pub use registry::Registry;
pub use rollback::RollbackSet;

/// Prelude for downstream binding layers.
pub mod prelude {
    pub use crate::adapter::{CacheStore, MutationAdapter, QueryHandle};
    pub use crate::binding::{ActiveBinding, BindingKind};
    pub use crate::coordinator::{
        ChangeEntry, ChangeError, ChangeState, PendingChange, SequentialTokens, TokenSource,
    };
    pub use crate::registry::Registry;
    pub use crate::rollback::RollbackSet;
    pub use mirage_core::{
        Entity, EntityId, Instruction, Patch, Selector, SourceDescriptor, SourceKind,
        StoredValue, identify_by,
    };
    pub use mirage_core::marker::{ChangeStatus, ChangeToken, SpeculativeMarker};
}
