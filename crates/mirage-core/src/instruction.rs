#![forbid(unsafe_code)]

//! Update instructions.
//!
//! [`Instruction`] is a closed tagged union keyed by action. Each variant
//! carries only the fields meaningful to it, so "which optional field applies
//! here" cannot arise and the engine matches exhaustively — there is no
//! unknown-action branch.
//!
//! Matching is driven by [`Selector`]:
//!
//! - an id selector wins over a predicate when both are set;
//! - a selector with neither matches nothing in collections (a malformed
//!   instruction is deliberately lenient, not an error);
//! - id matching requires the binding to carry an identity extractor; without
//!   one, an id selector never matches.
//!
//! [`Patch`] is how Update rewrites a match: a shallow partial merge or an
//! arbitrary transform. `None` leaves matches unchanged.

use std::rc::Rc;

use crate::entity::{Entity, EntityId, IdentifyFn};
use crate::marker::SpeculativeMarker;

/// Predicate over an entity, shared like an [`IdentifyFn`].
pub type PredicateFn = Rc<dyn Fn(&Entity) -> bool>;

/// Entity-to-entity transform.
pub type TransformFn = Rc<dyn Fn(&Entity) -> Entity>;

/// Addresses the items an Update/Delete/Replace applies to.
#[derive(Clone, Default)]
pub struct Selector {
    id: Option<EntityId>,
    predicate: Option<PredicateFn>,
}

impl Selector {
    /// Match the single item whose identity equals `id`.
    #[must_use]
    pub fn by_id(id: impl Into<EntityId>) -> Self {
        Self {
            id: Some(id.into()),
            predicate: None,
        }
    }

    /// Match every item satisfying `predicate`.
    #[must_use]
    pub fn by_predicate(predicate: impl Fn(&Entity) -> bool + 'static) -> Self {
        Self {
            id: None,
            predicate: Some(Rc::new(predicate)),
        }
    }

    /// Match nothing (the lenient "malformed instruction" selector).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Attach a predicate that is consulted only when no id is set.
    ///
    /// Exists so callers can express both fields at once; id precedence is
    /// part of the matching contract, not a builder quirk.
    #[must_use]
    pub fn or_predicate(mut self, predicate: impl Fn(&Entity) -> bool + 'static) -> Self {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Whether neither an id nor a predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.predicate.is_none()
    }

    /// Whether `entity` is addressed by this selector.
    ///
    /// Precedence: when an id is set the predicate is ignored entirely.
    #[must_use]
    pub fn matches(&self, entity: &Entity, identify: Option<&IdentifyFn>) -> bool {
        if let Some(id) = &self.id {
            return identify.is_some_and(|f| f(entity).as_ref() == Some(id));
        }
        if let Some(predicate) = &self.predicate {
            return predicate(entity);
        }
        false
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("id", &self.id)
            .field("predicate", &self.predicate.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// How an Update rewrites a matched item.
#[derive(Clone)]
pub enum Patch {
    /// Shallow-merge this partial into the match.
    Merge(Entity),
    /// Replace the match with the transform's output.
    Transform(TransformFn),
}

impl Patch {
    /// Build a transform patch from a closure.
    #[must_use]
    pub fn transform(f: impl Fn(&Entity) -> Entity + 'static) -> Self {
        Self::Transform(Rc::new(f))
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge(partial) => f.debug_tuple("Merge").field(partial).finish(),
            Self::Transform(_) => f.debug_tuple("Transform").field(&"fn").finish(),
        }
    }
}

/// A speculative edit to apply against every active binding of a target.
#[derive(Clone)]
pub enum Instruction {
    /// Insert `item` at the front of a collection.
    Prepend {
        /// Full entity to insert.
        item: Entity,
    },
    /// Insert `item` at the back of a collection.
    Append {
        /// Full entity to insert.
        item: Entity,
    },
    /// Rewrite matched items via `patch`; `None` leaves matches unchanged.
    Update {
        /// Which items to rewrite.
        selector: Selector,
        /// How to rewrite them.
        patch: Option<Patch>,
    },
    /// Remove matched items, preserving the order of survivors.
    Delete {
        /// Which items to remove.
        selector: Selector,
    },
    /// Substitute the full `item` for every matched item.
    Replace {
        /// Which items to replace.
        selector: Selector,
        /// Full replacement entity.
        item: Entity,
    },
}

impl Instruction {
    /// Prepend a full entity.
    #[must_use]
    pub fn prepend(item: Entity) -> Self {
        Self::Prepend { item }
    }

    /// Append a full entity.
    #[must_use]
    pub fn append(item: Entity) -> Self {
        Self::Append { item }
    }

    /// Update matched items with a patch.
    #[must_use]
    pub fn update(selector: Selector, patch: Patch) -> Self {
        Self::Update {
            selector,
            patch: Some(patch),
        }
    }

    /// Delete matched items.
    #[must_use]
    pub fn delete(selector: Selector) -> Self {
        Self::Delete { selector }
    }

    /// Replace matched items with a full entity.
    #[must_use]
    pub fn replace(selector: Selector, item: Entity) -> Self {
        Self::Replace { selector, item }
    }

    /// Action name for logging.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Prepend { .. } => "prepend",
            Self::Append { .. } => "append",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
        }
    }

    /// The new item this instruction introduces, if any.
    ///
    /// Prepend/Append/Replace introduce new identities and get stamped with a
    /// marker; Update/Delete only touch existing items.
    #[must_use]
    pub fn introduced_item(&self) -> Option<&Entity> {
        match self {
            Self::Prepend { item } | Self::Append { item } | Self::Replace { item, .. } => {
                Some(item)
            }
            Self::Update { .. } | Self::Delete { .. } => None,
        }
    }

    /// A copy of this instruction with its introduced item stamped.
    ///
    /// Instructions that introduce no item pass through unchanged.
    #[must_use]
    pub fn stamped(&self, marker: &SpeculativeMarker) -> Self {
        match self {
            Self::Prepend { item } => Self::Prepend {
                item: crate::marker::stamp(item, marker),
            },
            Self::Append { item } => Self::Append {
                item: crate::marker::stamp(item, marker),
            },
            Self::Replace { selector, item } => Self::Replace {
                selector: selector.clone(),
                item: crate::marker::stamp(item, marker),
            },
            other => other.clone(),
        }
    }
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prepend { item } => f.debug_struct("Prepend").field("item", item).finish(),
            Self::Append { item } => f.debug_struct("Append").field("item", item).finish(),
            Self::Update { selector, patch } => f
                .debug_struct("Update")
                .field("selector", selector)
                .field("patch", patch)
                .finish(),
            Self::Delete { selector } => {
                f.debug_struct("Delete").field("selector", selector).finish()
            }
            Self::Replace { selector, item } => f
                .debug_struct("Replace")
                .field("selector", selector)
                .field("item", item)
                .finish(),
        }
    }
}
