#![forbid(unsafe_code)]

//! Core data model and merge engine for Mirage.
//!
//! This crate is the pure half of the system: value types describing cached
//! data, instructions describing speculative edits, and [`engine::apply`],
//! the side-effect-free function that turns one into the other. Nothing here
//! touches a registry, a cache store, or the network — that plumbing lives in
//! `mirage-runtime`.
//!
//! # Architecture
//!
//! - [`entity`]: JSON-object entity model, identity extraction, shallow merge.
//! - [`marker`]: speculative-change markers stamped onto locally-created items.
//! - [`source`]: immutable data-source descriptors.
//! - [`value`]: the closed tagged union of cached value shapes.
//! - [`instruction`]: the closed tagged union of edit actions.
//! - [`engine`]: `apply(current, instruction, identify) -> next`, pure.
//!
//! # Invariants
//!
//! 1. `engine::apply` never mutates its input and never panics on well-typed
//!    input.
//! 2. Update/Delete/Replace preserve the relative order of surviving items.
//! 3. Paginated application touches page zero only; later pages keep their
//!    allocation identity.
//! 4. A selector with an id ignores its predicate; a selector with neither
//!    matches nothing in collections.

pub mod engine;
pub mod entity;
pub mod instruction;
pub mod marker;
pub mod source;
pub mod value;

pub use engine::apply;
pub use entity::{Entity, EntityId, IdentifyFn, identify_by, shallow_merge};
pub use instruction::{Instruction, Patch, PredicateFn, Selector, TransformFn};
pub use marker::{ChangeStatus, ChangeToken, SpeculativeMarker};
pub use source::{SourceDescriptor, SourceKind};
pub use value::{Page, StoredValue};
