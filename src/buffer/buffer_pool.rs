//! Buffer Pool - the coordinator for page access, locking and completion.
//!
//! The [`BufferPool`] provides:
//! - Page caching between table storage and memory
//! - Strict two-phase page locking with deadlock detection
//! - No-steal buffering: uncommitted changes never reach storage on eviction
//! - Commit (flush) and abort (restore before-images) of transactions

use std::sync::Arc;

use crate::buffer::{BufferPoolStats, Frame, PageCache, PageRef};
use crate::common::{BufferPoolConfig, Error, LockMode, PageId, Result, RowId, TableId, TransactionId};
use crate::concurrency::LockManager;
use crate::storage::{Catalog, TableStorage};

/// A row-level change applied through [`BufferPool::apply_mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a row; the table picks the slot.
    Insert { row: Vec<u8> },
    /// Delete the row at `row_id`.
    Delete { row_id: RowId },
}

/// Caches pages and mediates every transaction's access to them.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BufferPool                           │
/// │  ┌──────────────┐   ┌────────────────────────────────────┐   │
/// │  │ LockManager  │   │ PageCache: PageId → Arc<Frame>     │   │
/// │  │ locks, graph │   │ bounded, evicts clean frames only  │   │
/// │  │ held pages   │   └────────────────────────────────────┘   │
/// │  └──────────────┘   ┌──────────────┐   ┌────────────────┐    │
/// │                     │   Catalog    │   │     stats      │    │
/// │                     │ TableId → TS │   │    atomics     │    │
/// │                     └──────────────┘   └────────────────┘    │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Transactions
/// A transaction is any thread that passes the same [`TransactionId`] to
/// the pool. Locks taken by [`fetch_page`](Self::fetch_page) are held until
/// [`complete_transaction`](Self::complete_transaction). On
/// `Error::DeadlockAbort` the caller must abort the transaction.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use lockstepdb::{BufferPool, BufferPoolConfig, HeapTable, MemoryStore, Mutation};
/// use lockstepdb::{TableId, TransactionId};
///
/// let config = BufferPoolConfig::new(8).with_page_size(256);
/// let pool = BufferPool::new(config)?;
/// let table = Arc::new(HeapTable::new(TableId::new(1), 16, MemoryStore::new(256))?);
/// pool.register_table(table.clone())?;
///
/// let tid = TransactionId::new();
/// let row_id = pool
///     .apply_mutation(tid, TableId::new(1), Mutation::Insert { row: vec![1; 16] })?
///     .expect("insert returns a row id");
/// pool.complete_transaction(tid, true)?;
///
/// let reader = TransactionId::new();
/// let rows = table.scan(&pool, reader)?;
/// assert_eq!(rows, vec![(row_id, vec![1; 16])]);
/// pool.complete_transaction(reader, true)?;
/// # Ok::<(), lockstepdb::Error>(())
/// ```
pub struct BufferPool {
    config: BufferPoolConfig,
    cache: PageCache,
    catalog: Catalog,
    locks: LockManager,
    stats: Arc<BufferPoolStats>,
}

impl BufferPool {
    /// Create a pool with no tables registered.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `config` fails validation.
    pub fn new(config: BufferPoolConfig) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(BufferPoolStats::new());

        Ok(Self {
            config,
            cache: PageCache::new(config.pool_pages),
            catalog: Catalog::new(),
            locks: LockManager::new(config.lock_wait_interval, Arc::clone(&stats)),
            stats,
        })
    }

    /// Make a table's pages reachable through the pool.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the table's page size differs from the
    /// pool's.
    pub fn register_table(&self, table: Arc<dyn TableStorage>) -> Result<()> {
        if table.page_size() != self.config.page_size {
            return Err(Error::InvalidConfig(format!(
                "{} uses {}-byte pages, pool uses {}",
                table.table_id(),
                table.page_size(),
                self.config.page_size
            )));
        }

        let table_id = table.table_id();
        if self.catalog.add(table).is_some() {
            tracing::debug!(%table_id, "replaced table storage");
        } else {
            tracing::debug!(%table_id, "registered table");
        }
        Ok(())
    }

    /// The storage adapter registered for `table_id`.
    pub fn table(&self, table_id: TableId) -> Result<Arc<dyn TableStorage>> {
        self.catalog.get(table_id)
    }

    // ========================================================================
    // Public API: Page access
    // ========================================================================

    /// Lock `page_id` in `mode` for `tid` and return the cached frame.
    ///
    /// Blocks while another transaction holds an incompatible lock. On a
    /// cache miss the page is read from its table, evicting a clean page if
    /// the cache is full.
    ///
    /// # Errors
    /// - `Error::DeadlockAbort` if waiting would deadlock
    /// - `Error::ResourceExhausted` if every cached page is dirty
    /// - `Error::TableNotFound` and storage faults from the read
    ///
    /// The lock stays held even when loading fails.
    pub fn fetch_page(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<PageRef> {
        self.locks.acquire(tid, page_id, mode)?;

        if let Some(frame) = self.cache.get(page_id) {
            BufferPoolStats::incr(&self.stats.cache_hits);
            return Ok(frame);
        }

        self.handle_cache_miss(page_id)
    }

    /// Release `tid`'s lock on `page_id` before the transaction completes.
    ///
    /// This breaks two-phase locking: other transactions can observe or
    /// overwrite the page while `tid` is still running. Only use it for
    /// pages `tid` has neither read from in a way that matters nor modified.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.locks.release(tid, page_id);
    }

    /// Whether `tid` holds a lock on `page_id` in any mode.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(tid, page_id)
    }

    // ========================================================================
    // Public API: Mutations and completion
    // ========================================================================

    /// Apply a row mutation on behalf of `tid`.
    ///
    /// The table performs the change through [`fetch_page`](Self::fetch_page)
    /// and reports the pages it touched; each is marked dirty by `tid` and
    /// installed in the cache. Returns the new row id for inserts.
    ///
    /// # Errors
    /// - `Error::TableNotFound`, `Error::RowNotFound`, `Error::InvalidRow`
    /// - Anything [`fetch_page`](Self::fetch_page) can return
    /// - `Error::ResourceExhausted` if a dirtied page cannot be installed
    pub fn apply_mutation(
        &self,
        tid: TransactionId,
        table_id: TableId,
        mutation: Mutation,
    ) -> Result<Option<RowId>> {
        let table = self.catalog.get(table_id)?;

        let (row_id, dirtied) = match mutation {
            Mutation::Insert { row } => {
                let (row_id, pages) = table.insert_row(self, tid, &row)?;
                (Some(row_id), pages)
            }
            Mutation::Delete { row_id } => (None, table.delete_row(self, tid, row_id)?),
        };

        self.install_dirty_pages(tid, dirtied)?;
        Ok(row_id)
    }

    /// Commit or abort `tid` and release every lock it holds.
    ///
    /// For each page `tid` holds exclusively and that is cached:
    /// - commit: write it to storage if dirty, then make its content the
    ///   new before-image
    /// - abort: restore the before-image; if an uncommitted version was
    ///   already written to storage, write the restored content back
    ///
    /// A page whose commit write fails is rolled back to its before-image
    /// instead. Locks are released even when a page fails; the first
    /// failure is returned after all locks are gone.
    pub fn complete_transaction(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let pages = self.locks.take_held_pages(tid);
        let page_count = pages.len();
        let mut first_error = None;

        for page_id in pages {
            if self.locks.holds_exclusive(tid, page_id) {
                if let Some(frame) = self.cache.get(page_id) {
                    let outcome = if commit {
                        self.commit_page(&frame)
                    } else {
                        self.rollback_page(&frame)
                    };
                    if let Err(error) = outcome {
                        tracing::error!(%tid, %page_id, %error, commit, "failed to complete page");
                        first_error.get_or_insert(error);
                    }
                }
            }
            self.locks.release_lock(tid, page_id);
        }

        if commit {
            BufferPoolStats::incr(&self.stats.commits);
        } else {
            BufferPoolStats::incr(&self.stats.aborts);
        }
        tracing::debug!(%tid, commit, pages = page_count, "transaction completed");

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Public API: Administrative hooks
    // ========================================================================

    /// Write every dirty cached page to storage.
    ///
    /// Pages dirtied by running transactions are written too, so storage
    /// may hold uncommitted data until those transactions complete. Such
    /// pages stay cached; an abort writes their before-image back. Rolled
    /// back pages whose write-back failed are rewritten here as well.
    pub fn flush_all(&self) -> Result<()> {
        for frame in self.cache.frames() {
            self.flush_frame(&frame)?;
        }
        Ok(())
    }

    /// Write every cached page dirtied by `tid` to storage.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for frame in self.cache.frames() {
            if frame.dirtied_by() == Some(tid) {
                self.flush_frame(&frame)?;
            }
        }
        Ok(())
    }

    /// Write one cached page to storage if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        match self.cache.get(page_id) {
            Some(frame) => self.flush_frame(&frame).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Drop a page from the cache without writing it.
    ///
    /// Unflushed changes to the page are lost.
    pub fn discard_page(&self, page_id: PageId) {
        if self.cache.remove(page_id).is_some() {
            tracing::debug!(%page_id, "discarded cached page");
        }
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.contains(page_id)
    }

    /// Maximum number of cached pages.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn handle_cache_miss(&self, page_id: PageId) -> Result<PageRef> {
        BufferPoolStats::incr(&self.stats.cache_misses);

        let table = self.catalog.get(page_id.table_id)?;
        let data = table.read_page(page_id)?;
        BufferPoolStats::incr(&self.stats.pages_read);

        let loaded = Arc::new(Frame::loaded(page_id, data));
        let (frame, evicted) = match self.cache.insert_loaded(loaded) {
            Ok(inserted) => inserted,
            Err(error) => {
                tracing::warn!(%page_id, %error, "cannot cache page");
                return Err(error);
            }
        };

        if let Some(victim) = evicted {
            BufferPoolStats::incr(&self.stats.evictions);
            tracing::debug!(%page_id, %victim, "evicted clean page");
        }
        tracing::debug!(%page_id, "loaded page from storage");

        Ok(frame)
    }

    fn install_dirty_pages(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        for page in pages {
            let page_id = page.page_id();
            if !self.locks.holds_exclusive(tid, page_id) {
                return Err(Error::InvariantViolation(format!(
                    "{} modified {} without an exclusive lock",
                    tid, page_id
                )));
            }

            page.mark_dirty(tid);
            match self.cache.install(page) {
                Ok(Some(victim)) => {
                    BufferPoolStats::incr(&self.stats.evictions);
                    tracing::debug!(%page_id, %victim, "evicted clean page");
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%tid, %page_id, %error, "cannot install dirty page");
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Write `frame` to storage if storage differs from it. Returns whether
    /// it was written.
    fn flush_frame(&self, frame: &Frame) -> Result<bool> {
        let data = frame.read();
        if !frame.needs_write() {
            return Ok(false);
        }

        let page_id = frame.page_id();
        self.catalog.get(page_id.table_id)?.write_page(page_id, &data)?;
        frame.mark_flushed();
        BufferPoolStats::incr(&self.stats.pages_written);
        Ok(true)
    }

    /// Flush and advance the before-image. A page that cannot be written is
    /// rolled back instead, so its changes are never visible uncommitted.
    fn commit_page(&self, frame: &Frame) -> Result<()> {
        if let Err(error) = self.flush_frame(frame) {
            if let Err(rollback) = self.rollback_page(frame) {
                tracing::warn!(
                    page_id = %frame.page_id(),
                    error = %rollback,
                    "rollback after failed commit write failed"
                );
            }
            return Err(error);
        }
        frame.set_before_image();
        Ok(())
    }

    /// Restore the before-image and write it back if storage holds another
    /// version. On a failed write the frame stays pinned in the cache until
    /// a later flush succeeds.
    fn rollback_page(&self, frame: &Frame) -> Result<()> {
        if !frame.restore_before_image()? {
            return Ok(());
        }

        self.flush_frame(frame)?;
        tracing::debug!(page_id = %frame.page_id(), "rewrote before-image over flushed uncommitted page");
        Ok(())
    }
}
