#![forbid(unsafe_code)]

//! The update-application engine.
//!
//! [`apply`] is the algorithmic heart of Mirage: given a current cached value
//! and an instruction, produce the next value. It is a pure function — no
//! side effects, no registry knowledge, inputs never mutated — which is what
//! makes snapshot/rollback at the registry layer trivially correct.
//!
//! # Invariants
//!
//! 1. Inputs are never mutated; the result is always a fresh value (untouched
//!    pages excepted, which are shared by `Rc`).
//! 2. Update/Delete/Replace preserve the relative order of surviving items.
//! 3. Paginated values are edited on page zero only; pages `1..N` of the
//!    result are `Rc`-identical to the input's.
//! 4. A lenient engine: selectors that match nothing, id selectors without an
//!    identity extractor, and collection-only actions against single values
//!    all leave data unchanged rather than erroring. Speculative updates are
//!    best-effort UI sugar; validation with teeth lives in the coordinator.
//!
//! # Edge cases
//!
//! - Prepend/Append on an empty paginated value creates page zero, matching
//!   collection behavior on an empty vec.
//! - Update on a single value with an *empty* selector applies
//!   unconditionally ("update my profile"); a non-empty selector gates the
//!   update, which is what keeps token-keyed sync-replace from stomping
//!   unrelated entity state.

use std::rc::Rc;

use crate::entity::{Entity, IdentifyFn, shallow_merge};
use crate::instruction::{Instruction, Patch};
use crate::value::{Page, StoredValue};

/// Apply `instruction` to `current`, dispatching on the value's shape.
///
/// `identify` is the binding's identity extractor; `None` for entity
/// bindings, in which case id selectors never match.
#[must_use]
pub fn apply(
    current: &StoredValue,
    instruction: &Instruction,
    identify: Option<&IdentifyFn>,
) -> StoredValue {
    match current {
        StoredValue::Collection(items) => {
            StoredValue::Collection(apply_collection(items, instruction, identify))
        }
        StoredValue::Single(entity) => {
            StoredValue::Single(apply_single(entity, instruction, identify))
        }
        StoredValue::Pages(pages) => {
            StoredValue::Pages(apply_pages(pages, instruction, identify))
        }
    }
}

/// Collection semantics: edits at the edges, selector-driven rewrites inside.
fn apply_collection(
    items: &[Entity],
    instruction: &Instruction,
    identify: Option<&IdentifyFn>,
) -> Vec<Entity> {
    match instruction {
        Instruction::Prepend { item } => {
            let mut next = Vec::with_capacity(items.len() + 1);
            next.push(item.clone());
            next.extend(items.iter().cloned());
            next
        }
        Instruction::Append { item } => {
            let mut next = Vec::with_capacity(items.len() + 1);
            next.extend(items.iter().cloned());
            next.push(item.clone());
            next
        }
        Instruction::Update { selector, patch } => items
            .iter()
            .map(|e| {
                if selector.matches(e, identify) {
                    patched(e, patch.as_ref())
                } else {
                    e.clone()
                }
            })
            .collect(),
        Instruction::Delete { selector } => items
            .iter()
            .filter(|e| !selector.matches(e, identify))
            .cloned()
            .collect(),
        Instruction::Replace { selector, item } => items
            .iter()
            .map(|e| {
                if selector.matches(e, identify) {
                    item.clone()
                } else {
                    e.clone()
                }
            })
            .collect(),
    }
}

/// Single-entity semantics: Update and Replace only.
fn apply_single(
    entity: &Entity,
    instruction: &Instruction,
    identify: Option<&IdentifyFn>,
) -> Entity {
    match instruction {
        Instruction::Update { selector, patch } => {
            if selector.is_empty() || selector.matches(entity, identify) {
                patched(entity, patch.as_ref())
            } else {
                entity.clone()
            }
        }
        Instruction::Replace { item, .. } => item.clone(),
        // Collection-only actions are no-ops against a single value.
        Instruction::Prepend { .. } | Instruction::Append { .. } | Instruction::Delete { .. } => {
            entity.clone()
        }
    }
}

/// Paginated semantics: page zero gets collection treatment, the rest ride
/// along by reference.
fn apply_pages(
    pages: &[Page],
    instruction: &Instruction,
    identify: Option<&IdentifyFn>,
) -> Vec<Page> {
    match pages.split_first() {
        Some((first, rest)) => {
            let mut next = Vec::with_capacity(pages.len());
            next.push(Rc::new(apply_collection(first, instruction, identify)));
            next.extend(rest.iter().map(Rc::clone));
            next
        }
        None => match instruction {
            // An edge insert into an empty paginated value creates page zero.
            Instruction::Prepend { item } | Instruction::Append { item } => {
                vec![Rc::new(vec![item.clone()])]
            }
            _ => Vec::new(),
        },
    }
}

fn patched(entity: &Entity, patch: Option<&Patch>) -> Entity {
    match patch {
        Some(Patch::Transform(f)) => f(entity),
        Some(Patch::Merge(partial)) => shallow_merge(entity, partial),
        None => entity.clone(),
    }
}
