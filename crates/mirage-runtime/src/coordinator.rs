#![forbid(unsafe_code)]

//! The speculative-change coordinator.
//!
//! A [`PendingChange`] is one logical speculative change — possibly a batch
//! of `(target, instruction)` entries — from application through exactly one
//! of its three terminal outcomes:
//!
//! ```text
//! Pending ──success──▶ Synced     (authoritative response swapped in)
//!         ──success──▶ Committed  (speculative data kept as truth)
//!         ──failure──▶ RolledBack (pre-change snapshots restored)
//! ```
//!
//! # Invariants
//!
//! 1. One token per logical change; every item the change introduces carries
//!    it, across all targets of the batch.
//! 2. Entries apply in order; the composite rollback set concatenates in the
//!    same order.
//! 3. Success and failure are mutually exclusive terminal transitions; there
//!    is no path back to `Pending`. Resolving an already-terminal change is
//!    a caller bug — the coordinator logs a warning and keeps the first
//!    outcome rather than defending with panics (nothing here is fatal).
//! 4. Sync-replace finds items *still carrying this change's token*. Items
//!    independently modified or already replaced no longer match and are
//!    left alone.
//!
//! # Failure Modes
//!
//! - Success with no usable response: sync is skipped, the speculative data
//!   stays committed permanently (best available truth).
//! - Failure: rollback runs before the error is re-surfaced to the caller —
//!   recover locally, then report.

use std::cell::Cell;

use thiserror::Error;
use tracing::{debug, warn};

use mirage_core::entity::Entity;
use mirage_core::instruction::{Instruction, Patch, Selector};
use mirage_core::marker::{ChangeStatus, ChangeToken, SpeculativeMarker, carries_token, with_status};

use crate::registry::Registry;
use crate::rollback::RollbackSet;

/// Supplies tokens for logical changes. Token *policy* is the caller's; this
/// trait only abstracts where tokens come from.
pub trait TokenSource {
    /// Produce the next unique token.
    fn next_token(&self) -> ChangeToken;
}

/// Default token source: `prefix-1`, `prefix-2`, ...
///
/// Single-threaded counter, matching the rest of the runtime.
pub struct SequentialTokens {
    prefix: String,
    counter: Cell<u64>,
}

impl SequentialTokens {
    /// Tokens prefixed `mirage`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("mirage")
    }

    /// Tokens with a caller-chosen prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Cell::new(0),
        }
    }
}

impl Default for SequentialTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for SequentialTokens {
    fn next_token(&self) -> ChangeToken {
        let n = self.counter.get() + 1;
        self.counter.set(n);
        ChangeToken::new(format!("{}-{n}", self.prefix))
    }
}

/// One `(target, instruction)` entry of a logical change.
#[derive(Clone, Debug)]
pub struct ChangeEntry {
    target: String,
    instruction: Instruction,
    sync: bool,
}

impl ChangeEntry {
    /// Entry that keeps its speculative data on success (no sync-replace).
    #[must_use]
    pub fn new(target: impl Into<String>, instruction: Instruction) -> Self {
        Self {
            target: target.into(),
            instruction,
            sync: false,
        }
    }

    /// Mark this entry for sync-replace: on remote success its speculative
    /// items are swapped for the authoritative response.
    #[must_use]
    pub fn synced(mut self) -> Self {
        self.sync = true;
        self
    }

    /// The target source name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Coordinator-level validation failures, detected before any write.
#[derive(Debug, Error)]
pub enum ChangeError {
    /// A Prepend/Append supplied an item whose identity the target's
    /// bindings cannot extract — a partial where a full entity is required.
    #[error("speculative {action} into `{target}` requires a full entity with an extractable id")]
    PartialItem {
        /// Target source name.
        target: String,
        /// Offending action.
        action: &'static str,
    },
}

/// Lifecycle state of a logical change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeState {
    /// Applied locally, remote outcome unknown.
    Pending,
    /// Remote success; authoritative data swapped in for sync entries.
    Synced,
    /// Remote success; speculative data kept as committed truth.
    Committed,
    /// Remote failure; pre-change snapshots restored.
    RolledBack,
}

impl ChangeState {
    /// Whether the change has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

struct SyncTarget {
    name: String,
    sync: bool,
}

/// One logical speculative change, applied and awaiting its remote outcome.
pub struct PendingChange {
    token: ChangeToken,
    targets: Vec<SyncTarget>,
    rollback: RollbackSet,
    state: ChangeState,
}

impl PendingChange {
    /// Apply a logical change across all its entries.
    ///
    /// Stamps introduced items with `{token, Pending}`, validates that edge
    /// inserts carry full entities, applies each entry in order, and returns
    /// the change holding the composite rollback handle. Validation runs
    /// before any write: a batch either starts applying or doesn't.
    pub fn begin(
        registry: &Registry,
        token: ChangeToken,
        entries: Vec<ChangeEntry>,
    ) -> Result<Self, ChangeError> {
        for entry in &entries {
            validate_entry(registry, entry)?;
        }

        let marker = SpeculativeMarker::pending(token.clone());
        let mut rollback = RollbackSet::new();
        let mut targets = Vec::with_capacity(entries.len());
        for entry in entries {
            let stamped = entry.instruction.stamped(&marker);
            rollback.merge(registry.apply_update(&entry.target, &stamped));
            targets.push(SyncTarget {
                name: entry.target,
                sync: entry.sync,
            });
        }
        debug!(
            token = %token,
            entries = targets.len(),
            affected = rollback.len(),
            "speculative change applied"
        );
        Ok(Self {
            token,
            targets,
            rollback,
            state: ChangeState::Pending,
        })
    }

    /// The token stamped onto every item this change introduced.
    #[must_use]
    pub fn token(&self) -> &ChangeToken {
        &self.token
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChangeState {
        self.state
    }

    /// Number of bindings captured for rollback.
    #[must_use]
    pub fn affected_bindings(&self) -> usize {
        self.rollback.len()
    }

    /// Terminal transition for remote success.
    ///
    /// For each `sync` entry, items still carrying this change's token are
    /// replaced by `response`. Entries without sync keep their speculative
    /// data permanently, with their marker status rewritten to `Success` so
    /// renderers stop treating them as in-flight. A missing response skips
    /// sync entirely (the speculative value is the best available truth) and
    /// marks those entries `Success` too.
    pub fn resolve_success(
        &mut self,
        registry: &Registry,
        response: Option<&Entity>,
    ) -> ChangeState {
        if self.state.is_terminal() {
            warn!(token = %self.token, state = ?self.state, "resolve_success after terminal state ignored");
            return self.state;
        }

        if response.is_none() && self.targets.iter().any(|t| t.sync) {
            warn!(
                token = %self.token,
                "success without usable response; speculative data committed"
            );
        }

        let mut synced = false;
        for target in &self.targets {
            let token = self.token.clone();
            let instruction = match response {
                Some(authoritative) if target.sync => {
                    let replacement = authoritative.clone();
                    synced = true;
                    Instruction::update(
                        Selector::by_predicate(move |item| carries_token(item, &token)),
                        Patch::transform(move |_| replacement.clone()),
                    )
                }
                _ => Instruction::update(
                    Selector::by_predicate(move |item| carries_token(item, &token)),
                    Patch::transform(move |item| {
                        with_status(item, ChangeStatus::Success, None)
                    }),
                ),
            };
            // Resolution writes are authoritative; their rollback sets are
            // deliberately discarded.
            let _ = registry.apply_update(&target.name, &instruction);
        }

        self.state = if synced {
            ChangeState::Synced
        } else {
            ChangeState::Committed
        };
        debug!(token = %self.token, state = ?self.state, "change resolved");
        self.state
    }

    /// Flag every item of this change with a transient `Error` status.
    ///
    /// Optional UI sugar before [`resolve_failure`](Self::resolve_failure):
    /// bindings rendering marker status can show the failure for a beat
    /// before rollback removes the marker entirely. The status write is not
    /// captured for rollback — the original snapshots already predate it.
    pub fn flag_error(&self, registry: &Registry, message: impl Into<String>) {
        if self.state.is_terminal() {
            warn!(token = %self.token, "flag_error after terminal state ignored");
            return;
        }
        let message = message.into();
        for target in &self.targets {
            let token = self.token.clone();
            let message = message.clone();
            let instruction = Instruction::update(
                Selector::by_predicate(move |item| carries_token(item, &token)),
                Patch::transform(move |item| {
                    with_status(item, ChangeStatus::Error, Some(message.clone()))
                }),
            );
            let _ = registry.apply_update(&target.name, &instruction);
        }
    }

    /// Terminal transition for remote failure: restore every pre-change
    /// snapshot. The caller re-surfaces the remote error afterwards.
    pub fn resolve_failure(&mut self) -> ChangeState {
        if self.state.is_terminal() {
            warn!(token = %self.token, state = ?self.state, "resolve_failure after terminal state ignored");
            return self.state;
        }
        self.rollback.restore();
        self.state = ChangeState::RolledBack;
        debug!(token = %self.token, "change rolled back");
        self.state
    }
}

impl std::fmt::Debug for PendingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChange")
            .field("token", &self.token)
            .field("state", &self.state)
            .field("targets", &self.targets.len())
            .field("affected", &self.rollback.len())
            .finish()
    }
}

/// Edge inserts must carry a full entity: if any binding of the target can
/// extract identities, the new item's identity must be extractable too.
fn validate_entry(registry: &Registry, entry: &ChangeEntry) -> Result<(), ChangeError> {
    let item = match &entry.instruction {
        Instruction::Prepend { item } | Instruction::Append { item } => item,
        _ => return Ok(()),
    };
    for binding in registry.bindings_for(&entry.target) {
        if let Some(identify) = binding.identify()
            && identify(item).is_none()
        {
            return Err(ChangeError::PartialItem {
                target: entry.target.clone(),
                action: entry.instruction.action(),
            });
        }
    }
    Ok(())
}
