//! Lock manager - blocking two-phase page locks with deadlock detection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::BufferPoolStats;
use crate::common::{Error, LockMode, PageId, Result, TransactionId};
use crate::concurrency::{HeldPages, LockTable, WaitForGraph};

/// Grants page locks to transactions, blocking until they are compatible.
///
/// # Waiting
/// A request that cannot be granted publishes wait-for edges to the
/// page's current holders and checks the graph for a cycle through the
/// requester. Without a cycle it sleeps on the page's condvar until a
/// holder releases or `wait_interval` elapses, then retries; detection
/// runs again on every wake-up. Waiters are not queued, so a newcomer may
/// be granted before a transaction that has waited longer.
///
/// # Deadlocks
/// The requester that closes a cycle gets `Error::DeadlockAbort`. Its
/// other locks stay held; the caller is expected to abort the whole
/// transaction with [`BufferPool::complete_transaction`].
///
/// # Lock ordering
/// Page lock mutex, then the wait-for graph mutex, then the held-pages
/// registry.
///
/// [`BufferPool::complete_transaction`]: crate::BufferPool::complete_transaction
pub struct LockManager {
    table: LockTable,
    graph: WaitForGraph,
    held: HeldPages,
    wait_interval: Duration,
    stats: Arc<BufferPoolStats>,
}

impl LockManager {
    pub fn new(wait_interval: Duration, stats: Arc<BufferPoolStats>) -> Self {
        Self {
            table: LockTable::new(),
            graph: WaitForGraph::new(),
            held: HeldPages::new(),
            wait_interval,
            stats,
        }
    }

    /// Block until `tid` holds `page_id` in `mode`.
    ///
    /// # Errors
    /// `Error::DeadlockAbort` if waiting would close a wait-for cycle.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let lock = self.table.get_or_create(page_id);
        let mut state = lock.state.lock();
        let mut waited = false;

        loop {
            if state.try_acquire(tid, mode) {
                if waited {
                    self.graph.clear(tid);
                    tracing::trace!(%tid, %page_id, %mode, "lock granted after wait");
                }
                self.held.record(tid, page_id);
                return Ok(());
            }

            if !waited {
                waited = true;
                BufferPoolStats::incr(&self.stats.lock_waits);
                tracing::trace!(%tid, %page_id, %mode, "lock busy, waiting");
            }

            if self.graph.wait_on(tid, page_id, state.holders()) {
                BufferPoolStats::incr(&self.stats.deadlocks);
                tracing::warn!(%tid, %page_id, %mode, "deadlock detected, aborting requester");
                return Err(Error::DeadlockAbort { tid, page_id });
            }

            lock.released.wait_for(&mut state, self.wait_interval);
        }
    }

    /// Release `tid`'s lock on `page_id` and drop it from the held set.
    ///
    /// Releasing before the transaction completes breaks two-phase locking.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        self.release_lock(tid, page_id);
        self.held.forget(tid, page_id);
    }

    /// Release the lock only, waking any waiters.
    ///
    /// Waiters' edges to `tid` for this page are dropped before they wake,
    /// so `tid` can go on to request their pages without a stale cycle.
    pub(crate) fn release_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        let Some(lock) = self.table.get(page_id) else {
            return false;
        };
        let mut state = lock.state.lock();
        let released = state.release(tid);
        if released {
            self.graph.holder_released(tid, page_id);
            drop(state);
            lock.released.notify_all();
        }
        released
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .get(page_id)
            .is_some_and(|lock| lock.state.lock().holds(tid))
    }

    pub fn holds_exclusive(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .get(page_id)
            .is_some_and(|lock| lock.state.lock().holds_exclusive(tid))
    }

    /// Pages `tid` holds a lock on, sorted.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.held.pages(tid)
    }

    /// Remove and return `tid`'s held-page set, dropping its wait-for
    /// edges. The locks themselves are still held.
    pub(crate) fn take_held_pages(&self, tid: TransactionId) -> HashSet<PageId> {
        self.graph.clear(tid);
        self.held.take(tid)
    }

    /// Number of transactions currently holding locks.
    pub fn active_transactions(&self) -> usize {
        self.held.active_transactions()
    }

    /// Transactions `tid` is recorded as waiting on.
    pub fn waiting_on(&self, tid: TransactionId) -> HashSet<TransactionId> {
        self.graph.waiting_on(tid)
    }
}
