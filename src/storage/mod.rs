//! Storage layer - page stores, heap page format and the table adapter.
//!
//! ```text
//! +-------------------+
//! |    BufferPool     |
//! +-------------------+
//!          | TableStorage (per table, registered in the Catalog)
//!          v
//! +-------------------+
//! |   HeapTable<S>    |  row-level insert/delete, heap page format
//! +-------------------+
//!          | PageStore
//!      /        \
//!     v          v
//! +-----------+ +-------------+
//! | FileStore | | MemoryStore |
//! +-----------+ +-------------+
//! ```

mod catalog;
mod file_store;
pub mod heap_page;
mod heap_table;
mod memory_store;
mod page;

pub use catalog::Catalog;
pub use file_store::FileStore;
pub use heap_page::{HeapPage, PageHeader, PageType};
pub use heap_table::HeapTable;
pub use memory_store::MemoryStore;
pub use page::PageData;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{PageId, Result, RowId, TableId, TransactionId};

/// Raw page I/O for one table.
///
/// Page numbers are taken from `PageId::page_no`; the table part of the id
/// is only used for error reporting.
pub trait PageStore: Send + Sync {
    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Read an existing page.
    fn read_page(&self, page_id: PageId) -> Result<PageData>;

    /// Overwrite an existing page.
    fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()>;

    /// Add a page at the end and return its page number.
    fn append_page(&self, data: &PageData) -> Result<u32>;

    /// Number of pages currently stored.
    fn page_count(&self) -> Result<u32>;
}

/// The storage adapter the buffer pool consumes for one table.
///
/// Row mutations go through the pool: implementations fetch the pages they
/// touch with [`BufferPool::fetch_page`] (taking the appropriate locks),
/// edit them in place under the page latch, and return every page they
/// modified. The pool then marks them dirty and installs them in its cache.
pub trait TableStorage: Send + Sync {
    /// Table this adapter serves.
    fn table_id(&self) -> TableId;

    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Read and validate a page from durable storage.
    fn read_page(&self, page_id: PageId) -> Result<PageData>;

    /// Write a page to durable storage.
    fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()>;

    /// Number of pages in the table.
    fn page_count(&self) -> Result<u32>;

    /// Insert `row` on behalf of `tid`; returns its address and the pages
    /// it dirtied.
    fn insert_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row: &[u8],
    ) -> Result<(RowId, Vec<PageRef>)>;

    /// Delete the row at `row_id` on behalf of `tid`; returns the pages it
    /// dirtied.
    fn delete_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row_id: RowId,
    ) -> Result<Vec<PageRef>>;
}
