//! PageCache - bounded map from page id to cached frame.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::PageRef;
use crate::common::{Error, PageId, Result};

/// Bounded page cache with a no-steal eviction policy.
///
/// # Eviction
/// When an insertion would exceed capacity, the cache drops the first
/// evictable frame it finds (see [`Frame::is_evictable`]). There is no
/// recency ordering. Because only clean frames are chosen, eviction never
/// writes to storage. When every cached frame is dirty the insertion fails
/// with `Error::ResourceExhausted`.
///
/// # Thread Safety
/// The capacity check, eviction and insertion run under one write lock, so
/// `len() <= capacity()` holds at every point.
///
/// [`Frame::is_evictable`]: crate::buffer::Frame::is_evictable
pub struct PageCache {
    capacity: usize,
    pages: RwLock<HashMap<PageId, PageRef>>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pages: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    pub fn get(&self, page_id: PageId) -> Option<PageRef> {
        self.pages.read().get(&page_id).cloned()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.read().contains_key(&page_id)
    }

    /// Drop a frame without writing it anywhere.
    pub fn remove(&self, page_id: PageId) -> Option<PageRef> {
        self.pages.write().remove(&page_id)
    }

    /// Snapshot of every cached frame.
    pub fn frames(&self) -> Vec<PageRef> {
        self.pages.read().values().cloned().collect()
    }

    /// Cache a frame just read from storage.
    ///
    /// If another thread cached the same page first, that frame wins and is
    /// returned instead of `frame`. Also returns the evicted page, if any.
    pub fn insert_loaded(&self, frame: PageRef) -> Result<(PageRef, Option<PageId>)> {
        let mut pages = self.pages.write();
        if let Some(existing) = pages.get(&frame.page_id()) {
            return Ok((Arc::clone(existing), None));
        }

        let evicted = self.make_room(&mut pages)?;
        pages.insert(frame.page_id(), Arc::clone(&frame));
        Ok((frame, evicted))
    }

    /// Make `frame` the cached copy of its page, replacing any other frame
    /// cached for it. Returns the evicted page, if room had to be made.
    pub fn install(&self, frame: PageRef) -> Result<Option<PageId>> {
        let mut pages = self.pages.write();
        if let Some(existing) = pages.get_mut(&frame.page_id()) {
            *existing = frame;
            return Ok(None);
        }

        let evicted = self.make_room(&mut pages)?;
        pages.insert(frame.page_id(), frame);
        Ok(evicted)
    }

    fn make_room(&self, pages: &mut HashMap<PageId, PageRef>) -> Result<Option<PageId>> {
        if pages.len() < self.capacity {
            return Ok(None);
        }

        let victim = pages
            .iter()
            .find(|(_, frame)| frame.is_evictable())
            .map(|(page_id, _)| *page_id)
            .ok_or(Error::ResourceExhausted {
                capacity: self.capacity,
            })?;

        pages.remove(&victim);
        Ok(Some(victim))
    }
}
