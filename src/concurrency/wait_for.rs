//! Wait-for graph and deadlock detection.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::{PageId, TransactionId};

/// Directed graph of which transaction waits on which.
///
/// An edge `A -> B` means A is blocked on a lock B holds. Edges are set by
/// the waiter itself, replacing its previous edges, and remember the page
/// the waiter is blocked on so a holder releasing that page can drop the
/// edges pointing at it.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: Mutex<HashMap<TransactionId, Waiting>>,
}

#[derive(Debug)]
struct Waiting {
    page_id: PageId,
    holders: HashSet<TransactionId>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` is blocked on `page_id`, held by `holders`, and
    /// check whether that closes a cycle through `waiter`.
    ///
    /// On a cycle the waiter's edges are removed before returning `true`.
    /// Setting the edges, searching and removing them happen under one
    /// lock, so of two transactions closing the same cycle concurrently
    /// exactly one observes it.
    pub fn wait_on<I>(&self, waiter: TransactionId, page_id: PageId, holders: I) -> bool
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let holders: HashSet<TransactionId> =
            holders.into_iter().filter(|h| *h != waiter).collect();

        let mut edges = self.edges.lock();
        if holders.is_empty() {
            edges.remove(&waiter);
            return false;
        }
        edges.insert(waiter, Waiting { page_id, holders });

        if Self::reaches_self(&edges, waiter) {
            edges.remove(&waiter);
            return true;
        }
        false
    }

    /// Breadth-first search from `start` for a path back to `start`.
    fn reaches_self(edges: &HashMap<TransactionId, Waiting>, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<TransactionId> = VecDeque::new();
        queue.push_back(start);

        while let Some(tid) = queue.pop_front() {
            let Some(waiting) = edges.get(&tid) else {
                continue;
            };
            for &target in &waiting.holders {
                if target == start {
                    return true;
                }
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        false
    }

    /// Drop edges to `holder` from transactions blocked on `page_id`.
    pub fn holder_released(&self, holder: TransactionId, page_id: PageId) {
        self.edges.lock().retain(|_, waiting| {
            if waiting.page_id == page_id {
                waiting.holders.remove(&holder);
            }
            !waiting.holders.is_empty()
        });
    }

    /// Remove every edge out of `tid`.
    pub fn clear(&self, tid: TransactionId) {
        self.edges.lock().remove(&tid);
    }

    /// Transactions `tid` is currently recorded as waiting on.
    pub fn waiting_on(&self, tid: TransactionId) -> HashSet<TransactionId> {
        self.edges
            .lock()
            .get(&tid)
            .map(|waiting| waiting.holders.clone())
            .unwrap_or_default()
    }

    /// Number of transactions with outgoing edges.
    pub fn waiter_count(&self) -> usize {
        self.edges.lock().len()
    }
}
