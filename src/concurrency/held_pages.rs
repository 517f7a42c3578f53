//! Per-transaction registry of locked pages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::common::{PageId, TransactionId};

type PageSet = Arc<Mutex<HashSet<PageId>>>;

/// Which pages each transaction holds a lock on.
///
/// Each transaction has its own set behind its own mutex; the outer map
/// is only write-locked to add or drop a transaction. Grants to different
/// transactions therefore do not contend.
///
/// A transaction's set is created on its first grant and removed whole
/// when the transaction completes.
#[derive(Debug, Default)]
pub struct HeldPages {
    sets: RwLock<HashMap<TransactionId, PageSet>>,
}

impl HeldPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tid: TransactionId, page_id: PageId) {
        {
            // The read guard is held across the insert so `forget` cannot
            // drop the set in between.
            let sets = self.sets.read();
            if let Some(pages) = sets.get(&tid) {
                pages.lock().insert(page_id);
                return;
            }
        }
        self.sets.write().entry(tid).or_default().lock().insert(page_id);
    }

    /// Remove one page; drops the transaction's set once it is empty.
    pub fn forget(&self, tid: TransactionId, page_id: PageId) {
        let now_empty = {
            let sets = self.sets.read();
            match sets.get(&tid) {
                Some(pages) => {
                    let mut pages = pages.lock();
                    pages.remove(&page_id);
                    pages.is_empty()
                }
                None => false,
            }
        };

        if now_empty {
            let mut sets = self.sets.write();
            if sets.get(&tid).is_some_and(|pages| pages.lock().is_empty()) {
                sets.remove(&tid);
            }
        }
    }

    /// Remove and return the transaction's whole set.
    pub fn take(&self, tid: TransactionId) -> HashSet<PageId> {
        match self.sets.write().remove(&tid) {
            Some(pages) => std::mem::take(&mut *pages.lock()),
            None => HashSet::new(),
        }
    }

    pub fn pages(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .sets
            .read()
            .get(&tid)
            .map(|set| set.lock().iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Number of transactions holding at least one page.
    pub fn active_transactions(&self) -> usize {
        self.sets.read().len()
    }
}
