//! Frame - one cached page.
//!
//! A [`Frame`] holds a page's bytes plus the metadata the pool needs to
//! commit or undo a transaction's changes to it:
//! - Which transaction dirtied it (if any)
//! - The before-image: the last committed content
//! - Whether an uncommitted version was already written to storage
//! - Whether storage still holds a rolled-back version

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{Error, PageId, Result, TransactionId};
use crate::storage::PageData;

/// Shared handle to a cached frame.
pub type PageRef = Arc<Frame>;

/// A page resident in the buffer pool.
///
/// # Thread Safety
/// - `data`: `RwLock` latch for reading and editing the bytes
/// - `state`: `Mutex` for dirty/before-image bookkeeping
///
/// The latch is a short-term physical guard. Logical isolation between
/// transactions comes from the page locks taken in
/// [`BufferPool::fetch_page`](crate::BufferPool::fetch_page).
///
/// # Lock ordering
/// When both are needed, the data latch is taken before the state mutex.
#[derive(Debug)]
pub struct Frame {
    page_id: PageId,
    data: RwLock<PageData>,
    state: Mutex<FrameState>,
}

#[derive(Debug, Default)]
struct FrameState {
    /// Transaction that modified the page since it was last flushed.
    dirtied_by: Option<TransactionId>,

    /// Last committed content.
    before_image: Option<PageData>,

    /// A dirty version was written to storage before its transaction
    /// completed. Storage then no longer holds the committed content.
    flushed_uncommitted: bool,

    /// The content was rolled back after an uncommitted version reached
    /// storage, and the restored content has not been written back yet.
    stale_on_storage: bool,
}

impl Frame {
    /// Wrap a page freshly read from storage.
    ///
    /// The content is committed, so it becomes the before-image.
    pub fn loaded(page_id: PageId, data: PageData) -> Self {
        let before_image = Some(data.duplicate());
        Self {
            page_id,
            data: RwLock::new(data),
            state: Mutex::new(FrameState {
                before_image,
                ..FrameState::default()
            }),
        }
    }

    /// Wrap a page with no before-image.
    pub fn new(page_id: PageId, data: PageData) -> Self {
        Self {
            page_id,
            data: RwLock::new(data),
            state: Mutex::new(FrameState::default()),
        }
    }

    /// Page this frame caches.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Acquire the read latch.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.read()
    }

    /// Acquire the write latch.
    ///
    /// Edits are not tracked automatically: the pool marks a page dirty
    /// when a storage adapter reports it from a row mutation.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.write()
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Record that `tid` modified the page.
    pub fn mark_dirty(&self, tid: TransactionId) {
        self.state.lock().dirtied_by = Some(tid);
    }

    /// Transaction that dirtied the page, if it is dirty.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.state.lock().dirtied_by
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by().is_some()
    }

    /// Whether storage differs from the cached content: the page is dirty,
    /// or a rollback has not been written back yet.
    pub fn needs_write(&self) -> bool {
        let state = self.state.lock();
        state.dirtied_by.is_some() || state.stale_on_storage
    }

    /// Record that the current content was written to storage.
    ///
    /// Clears the dirty mark. If the written content was dirty it is not
    /// committed yet, so the frame remembers that storage must be rolled
    /// back on abort.
    pub fn mark_flushed(&self) {
        let mut state = self.state.lock();
        state.stale_on_storage = false;
        if state.dirtied_by.take().is_some() {
            state.flushed_uncommitted = true;
        }
    }

    /// Whether storage holds an uncommitted version of this page.
    pub fn is_flushed_uncommitted(&self) -> bool {
        self.state.lock().flushed_uncommitted
    }

    /// Whether storage still holds a version that was rolled back.
    pub fn is_stale_on_storage(&self) -> bool {
        self.state.lock().stale_on_storage
    }

    // ========================================================================
    // Before-image
    // ========================================================================

    pub fn has_before_image(&self) -> bool {
        self.state.lock().before_image.is_some()
    }

    /// Copy of the before-image.
    pub fn before_image(&self) -> Option<PageData> {
        self.state.lock().before_image.as_ref().map(PageData::duplicate)
    }

    /// Make the current content the new before-image.
    ///
    /// Called on commit, after the page was flushed.
    pub fn set_before_image(&self) {
        let data = self.data.read();
        let mut state = self.state.lock();
        match state.before_image.as_mut() {
            Some(image) => image.copy_from(&data),
            None => state.before_image = Some(data.duplicate()),
        }
        state.flushed_uncommitted = false;
    }

    /// Replace the current content with the before-image and clear the
    /// dirty mark.
    ///
    /// Returns `true` if storage holds a version that must be overwritten
    /// with the restored content. The frame then stays stale on storage,
    /// and so unevictable, until [`Frame::mark_flushed`] records the write.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the frame has no before-image.
    pub fn restore_before_image(&self) -> Result<bool> {
        let mut data = self.data.write();
        let mut state = self.state.lock();

        let image = state.before_image.as_ref().ok_or_else(|| {
            Error::InvariantViolation(format!("{} has no before-image to restore", self.page_id))
        })?;
        data.copy_from(image);

        state.dirtied_by = None;
        if std::mem::take(&mut state.flushed_uncommitted) {
            state.stale_on_storage = true;
        }
        Ok(state.stale_on_storage)
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Whether the frame can be dropped from the cache without losing
    /// anything storage does not already have.
    ///
    /// A frame is not evictable while it is dirty, latched for writing, or
    /// storage holds a version other than its committed content.
    pub fn is_evictable(&self) -> bool {
        if self.data.is_locked_exclusive() {
            return false;
        }
        let state = self.state.lock();
        state.dirtied_by.is_none() && !state.flushed_uncommitted && !state.stale_on_storage
    }
}
