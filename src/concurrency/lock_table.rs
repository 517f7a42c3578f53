//! Lock table - per-page shared/exclusive lock state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::common::{LockMode, PageId, TransactionId};

/// Holders of one page lock.
///
/// # Invariants
/// - At most one exclusive holder.
/// - With an exclusive holder, the shared set is empty or contains only
///   that holder.
///
/// All operations are non-blocking; waiting is the lock manager's job.
#[derive(Debug, Default)]
pub struct LockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockState {
    /// Grant `mode` to `tid` if compatible with the current holders.
    ///
    /// Re-acquiring a held lock succeeds. An exclusive request from the sole
    /// shared holder upgrades the lock.
    pub fn try_acquire(&mut self, tid: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => {
                if self.exclusive.is_some_and(|holder| holder != tid) {
                    return false;
                }
                self.shared.insert(tid);
                true
            }
            LockMode::Exclusive => {
                if self.exclusive.is_some_and(|holder| holder != tid) {
                    return false;
                }
                if self.shared.iter().any(|holder| *holder != tid) {
                    return false;
                }
                self.exclusive = Some(tid);
                self.shared.clear();
                true
            }
        }
    }

    /// Drop every hold `tid` has. Returns whether it held anything.
    pub fn release(&mut self, tid: TransactionId) -> bool {
        let mut released = self.shared.remove(&tid);
        if self.exclusive == Some(tid) {
            self.exclusive = None;
            released = true;
        }
        released
    }

    pub fn holds(&self, tid: TransactionId) -> bool {
        self.exclusive == Some(tid) || self.shared.contains(&tid)
    }

    pub fn holds_exclusive(&self, tid: TransactionId) -> bool {
        self.exclusive == Some(tid)
    }

    /// Every transaction holding the lock in any mode.
    pub fn holders(&self) -> HashSet<TransactionId> {
        let mut holders = self.shared.clone();
        holders.extend(self.exclusive);
        holders
    }

    pub fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

/// Lock state for one page plus the condition waiters sleep on.
#[derive(Debug, Default)]
pub struct PageLock {
    pub(crate) state: Mutex<LockState>,
    pub(crate) released: Condvar,
}

/// Map of page locks.
///
/// Entries are created on first request and never removed.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: RwLock<HashMap<PageId, Arc<PageLock>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `page_id`, creating it if needed.
    pub fn get_or_create(&self, page_id: PageId) -> Arc<PageLock> {
        if let Some(lock) = self.locks.read().get(&page_id) {
            return Arc::clone(lock);
        }
        Arc::clone(self.locks.write().entry(page_id).or_default())
    }

    pub fn get(&self, page_id: PageId) -> Option<Arc<PageLock>> {
        self.locks.read().get(&page_id).cloned()
    }

    /// Number of pages that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use proptest::prelude::*;

    fn tids(n: usize) -> Vec<TransactionId> {
        (0..n).map(|_| TransactionId::new()).collect()
    }

    #[test]
    fn test_shared_locks_coexist() {
        let t = tids(2);
        let mut state = LockState::default();
        assert!(state.try_acquire(t[0], LockMode::Shared));
        assert!(state.try_acquire(t[1], LockMode::Shared));
        assert!(state.holds(t[0]) && state.holds(t[1]));
        assert!(!state.holds_exclusive(t[0]));
    }

    #[test]
    fn test_exclusive_blocks_others() {
        let t = tids(2);
        let mut state = LockState::default();
        assert!(state.try_acquire(t[0], LockMode::Exclusive));
        assert!(!state.try_acquire(t[1], LockMode::Shared));
        assert!(!state.try_acquire(t[1], LockMode::Exclusive));

        // The holder itself may take either mode again.
        assert!(state.try_acquire(t[0], LockMode::Shared));
        assert!(state.try_acquire(t[0], LockMode::Exclusive));
    }

    #[test]
    fn test_upgrade_only_as_sole_holder() {
        let t = tids(2);
        let mut state = LockState::default();
        state.try_acquire(t[0], LockMode::Shared);
        state.try_acquire(t[1], LockMode::Shared);
        assert!(!state.try_acquire(t[0], LockMode::Exclusive));

        state.release(t[1]);
        assert!(state.try_acquire(t[0], LockMode::Exclusive));
        assert!(state.holds_exclusive(t[0]));
    }

    #[test]
    fn test_release() {
        let t = tids(2);
        let mut state = LockState::default();
        state.try_acquire(t[0], LockMode::Exclusive);

        assert!(!state.release(t[1]));
        assert!(state.release(t[0]));
        assert!(state.is_free());
        assert!(!state.release(t[0]));
    }

    #[test]
    fn test_holders() {
        let t = tids(2);
        let mut state = LockState::default();
        state.try_acquire(t[0], LockMode::Shared);
        state.try_acquire(t[1], LockMode::Shared);
        assert_eq!(state.holders(), t.iter().copied().collect());
    }

    #[test]
    fn test_table_reuses_entries() {
        let table = LockTable::new();
        let page = PageId::new(TableId::new(1), 0);
        assert!(table.get(page).is_none());

        let a = table.get_or_create(page);
        let b = table.get_or_create(page);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_mutual_exclusion(ops in prop::collection::vec((0usize..4, 0u8..3), 1..80)) {
            let t = tids(4);
            let mut state = LockState::default();

            for (who, op) in ops {
                let tid = t[who];
                match op {
                    0 => { state.try_acquire(tid, LockMode::Shared); }
                    1 => { state.try_acquire(tid, LockMode::Exclusive); }
                    _ => { state.release(tid); }
                }

                if let Some(holder) = state.exclusive {
                    prop_assert!(state.shared.iter().all(|s| *s == holder));
                }
            }
        }

        #[test]
        fn prop_grant_matches_compatibility(
            setup in prop::collection::vec((0usize..4, any::<bool>()), 0..6),
            who in 0usize..4,
            exclusive in any::<bool>(),
        ) {
            let t = tids(4);
            let mut state = LockState::default();
            for (i, ex) in setup {
                let mode = if ex { LockMode::Exclusive } else { LockMode::Shared };
                state.try_acquire(t[i], mode);
            }

            let tid = t[who];
            let others: Vec<_> = state.holders().into_iter().filter(|h| *h != tid).collect();
            let other_exclusive = state.exclusive.is_some_and(|h| h != tid);
            let expected = if exclusive { others.is_empty() } else { !other_exclusive };

            let mode = if exclusive { LockMode::Exclusive } else { LockMode::Shared };
            prop_assert_eq!(state.try_acquire(tid, mode), expected);
        }
    }
}
