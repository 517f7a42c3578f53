//! In-memory page store for tests.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::common::{Error, PageId, Result};
use crate::storage::{PageData, PageStore};

/// In-memory [`PageStore`].
///
/// Nothing is persistent; all pages are lost when the store is dropped.
///
/// # Fault injection
/// [`MemoryStore::set_failing`] makes every subsequent read, write and
/// append return an I/O error, so tests can observe how storage faults
/// propagate through the buffer pool.
pub struct MemoryStore {
    pages: Mutex<Vec<PageData>>,
    page_size: usize,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store for pages of `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            page_size,
            failing: AtomicBool::new(false),
        }
    }

    /// Toggle injected I/O failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(io::Error::other("injected storage fault")));
        }
        Ok(())
    }

    fn check_size(&self, data: &PageData) -> Result<()> {
        if data.len() != self.page_size {
            return Err(Error::InvalidConfig(format!(
                "page has {} bytes, store expects {}",
                data.len(),
                self.page_size
            )));
        }
        Ok(())
    }
}

impl PageStore for MemoryStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> Result<PageData> {
        self.check_fault()?;
        let pages = self.pages.lock();
        pages
            .get(page_id.page_no as usize)
            .map(PageData::duplicate)
            .ok_or(Error::PageNotFound(page_id))
    }

    fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()> {
        self.check_fault()?;
        self.check_size(data)?;
        let mut pages = self.pages.lock();
        let slot = pages
            .get_mut(page_id.page_no as usize)
            .ok_or(Error::PageNotFound(page_id))?;
        slot.copy_from(data);
        Ok(())
    }

    fn append_page(&self, data: &PageData) -> Result<u32> {
        self.check_fault()?;
        self.check_size(data)?;
        let mut pages = self.pages.lock();
        pages.push(data.duplicate());
        Ok((pages.len() - 1) as u32)
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.lock().len() as u32)
    }
}
