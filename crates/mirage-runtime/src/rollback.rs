#![forbid(unsafe_code)]

//! Rollback sets.
//!
//! A [`RollbackSet`] is a *value*: an ordered sequence of restore actions,
//! one per affected binding, each closing over a full snapshot of that
//! binding's pre-change value. It is not a live subscription — it is safe to
//! store and invoke later, including after the originating query has
//! unregistered (the restore writes through the captured store closure, which
//! is harmless once nothing reads that cache key).
//!
//! # Invariants
//!
//! 1. Invoking the full set restores every affected binding to its exact
//!    pre-change value. Restores run in *reverse* capture order, so a batch
//!    whose entries touched the same binding twice unwinds to the snapshot
//!    taken before the first entry, not an intermediate one.
//! 2. Invoking it more than once is idempotent: the second pass performs a
//!    harmless identical overwrite.
//! 3. [`merge`](RollbackSet::merge) preserves capture order — entries of
//!    `self` first, then `other`'s.

/// Ordered restore actions captured when a speculative change was applied.
#[derive(Default)]
pub struct RollbackSet {
    restores: Vec<Box<dyn Fn()>>,
}

impl RollbackSet {
    /// An empty set (the result of updating a target with no bindings).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one restore action. Crate-internal: only `apply_update` captures.
    pub(crate) fn push(&mut self, restore: impl Fn() + 'static) {
        self.restores.push(Box::new(restore));
    }

    /// Append all of `other`'s restores after this set's.
    pub fn merge(&mut self, other: RollbackSet) {
        self.restores.extend(other.restores);
    }

    /// Restore every captured snapshot, in reverse capture order.
    ///
    /// Idempotent: each action overwrites with the same snapshot every time.
    pub fn restore(&self) {
        for action in self.restores.iter().rev() {
            action();
        }
    }

    /// Number of captured restore actions (one per scanned binding).
    #[must_use]
    pub fn len(&self) -> usize {
        self.restores.len()
    }

    /// Whether no bindings were affected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.restores.is_empty()
    }
}

impl std::fmt::Debug for RollbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackSet")
            .field("restores", &self.restores.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn restores_in_reverse_capture_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = RollbackSet::new();
        for i in 0..3 {
            let log = Rc::clone(&log);
            set.push(move || log.borrow_mut().push(i));
        }
        set.restore();
        assert_eq!(*log.borrow(), [2, 1, 0]);
    }

    #[test]
    fn overlapping_captures_unwind_to_first_snapshot() {
        let value = Rc::new(RefCell::new(2));
        let mut set = RollbackSet::new();
        for snapshot in [0, 1] {
            let target = Rc::clone(&value);
            set.push(move || *target.borrow_mut() = snapshot);
        }
        set.restore();
        assert_eq!(*value.borrow(), 0, "first-captured snapshot wins");
    }

    #[test]
    fn restore_twice_is_identical_overwrite() {
        let value = Rc::new(RefCell::new(String::from("changed")));
        let mut set = RollbackSet::new();
        let snapshot = String::from("original");
        let target = Rc::clone(&value);
        set.push(move || *target.borrow_mut() = snapshot.clone());

        set.restore();
        assert_eq!(*value.borrow(), "original");
        *value.borrow_mut() = "changed again".into();
        set.restore();
        assert_eq!(*value.borrow(), "original", "second restore same outcome");
    }

    #[test]
    fn merge_appends_and_restore_unwinds_backwards() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut first = RollbackSet::new();
        let l = Rc::clone(&log);
        first.push(move || l.borrow_mut().push("a"));

        let mut second = RollbackSet::new();
        let l = Rc::clone(&log);
        second.push(move || l.borrow_mut().push("b"));

        first.merge(second);
        assert_eq!(first.len(), 2);
        first.restore();
        assert_eq!(*log.borrow(), ["b", "a"]);
    }

    #[test]
    fn empty_set_is_a_quiet_noop() {
        let set = RollbackSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        set.restore();
    }
}
