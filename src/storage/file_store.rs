//! File store - low-level file I/O for one table's pages.
//!
//! The [`FileStore`] handles all direct file operations:
//! - Reading and writing pages
//! - Appending new pages
//! - Managing the table file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::{Error, PageId, Result};
use crate::storage::{PageData, PageStore};

/// Manages disk I/O for a single table file.
///
/// # File Layout
/// The table is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0    P       2P      ...     N×P
/// ```
///
/// Page N is located at file offset `N × page_size`.
///
/// # Thread Safety
/// The file handle and page count sit behind one mutex, so reads, writes
/// and appends from concurrent transactions are serialized per table.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct FileStore {
    inner: Mutex<FileInner>,
    page_size: usize,
}

struct FileInner {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl FileStore {
    /// Create a new table file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            inner: Mutex::new(FileInner {
                file,
                page_count: 0,
            }),
            page_size,
        })
    }

    /// Open an existing table file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, or
    /// `Error::InvalidConfig` if its size is not a multiple of `page_size`.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % page_size as u64 != 0 {
            return Err(Error::InvalidConfig(format!(
                "file size {} is not a multiple of page size {}",
                file_size, page_size
            )));
        }
        let page_count = (file_size / page_size as u64) as u32;

        Ok(Self {
            inner: Mutex::new(FileInner { file, page_count }),
            page_size,
        })
    }

    /// Open an existing table file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, page_size)
        } else {
            Self::create(path, page_size)
        }
    }

    /// Get the total size of the table file in bytes.
    pub fn file_size(&self) -> u64 {
        self.inner.lock().page_count as u64 * self.page_size as u64
    }

    fn offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
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

impl PageStore for FileStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> Result<PageData> {
        let mut inner = self.inner.lock();
        if page_id.page_no >= inner.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        inner.file.seek(SeekFrom::Start(self.offset(page_id.page_no)))?;
        let mut page = PageData::zeroed(self.page_size);
        inner.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()> {
        self.check_size(data)?;
        let mut inner = self.inner.lock();
        if page_id.page_no >= inner.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        inner.file.seek(SeekFrom::Start(self.offset(page_id.page_no)))?;
        inner.file.write_all(data.as_slice())?;
        inner.file.sync_all()?;

        Ok(())
    }

    fn append_page(&self, data: &PageData) -> Result<u32> {
        self.check_size(data)?;
        let mut inner = self.inner.lock();
        let page_no = inner.page_count;

        inner.file.seek(SeekFrom::Start(self.offset(page_no)))?;
        inner.file.write_all(data.as_slice())?;
        inner.file.sync_all()?;

        inner.page_count += 1;
        Ok(page_no)
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.inner.lock().page_count)
    }
}
