//! HeapTable - unordered fixed-width rows over a [`PageStore`].

use crate::buffer::{BufferPool, PageRef};
use crate::common::{Error, LockMode, PageId, Result, RowId, TableId, TransactionId};
use crate::storage::heap_page::{slots_per_page, HeapPage, PageHeader, PageType};
use crate::storage::{PageData, PageStore, TableStorage};

/// A table storing fixed-width rows in no particular order.
///
/// Pages use the [`HeapPage`] layout. Checksums are stamped on every write
/// to the store and verified on every read from it.
///
/// # Locking
/// - `insert_row` scans pages under shared locks and upgrades to an
///   exclusive lock on the first page with a free slot. When every page is
///   full it appends a fresh page and locks that one exclusively.
/// - `delete_row` takes an exclusive lock on the row's page.
/// - `scan` takes shared locks on every page.
///
/// Locks are held until the transaction completes.
pub struct HeapTable<S> {
    table_id: TableId,
    row_width: u16,
    store: S,
}

impl<S: PageStore> HeapTable<S> {
    /// Create a table over `store` with `row_width`-byte rows.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if a page of the store's size cannot hold a
    /// single row.
    pub fn new(table_id: TableId, row_width: usize, store: S) -> Result<Self> {
        let row_width_u16 = u16::try_from(row_width)
            .map_err(|_| Error::InvalidConfig(format!("row width {} too large", row_width)))?;
        if slots_per_page(store.page_size(), row_width) == 0 {
            return Err(Error::InvalidConfig(format!(
                "row width {} does not fit a {}-byte page",
                row_width,
                store.page_size()
            )));
        }

        Ok(Self {
            table_id,
            row_width: row_width_u16,
            store,
        })
    }

    /// Width of every row in bytes.
    pub fn row_width(&self) -> usize {
        self.row_width as usize
    }

    /// Rows that fit on one page.
    pub fn rows_per_page(&self) -> usize {
        slots_per_page(self.store.page_size(), self.row_width())
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a formatted, empty page and return its id.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let mut data = PageData::zeroed(self.store.page_size());
        HeapPage::format(data.as_mut_slice(), self.row_width);
        PageHeader::stamp_checksum(data.as_mut_slice());

        let page_no = self.store.append_page(&data)?;
        Ok(PageId::new(self.table_id, page_no))
    }

    /// Collect every row in the table, taking shared locks page by page.
    pub fn scan(&self, pool: &BufferPool, tid: TransactionId) -> Result<Vec<(RowId, Vec<u8>)>> {
        let mut rows = Vec::new();

        for page_no in 0..self.store.page_count()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.fetch_page(tid, page_id, LockMode::Shared)?;
            let data = page.read();
            rows.extend(
                HeapPage::new(data.as_slice())
                    .rows()
                    .map(|(slot, row)| (RowId::new(page_id, slot), row.to_vec())),
            );
        }

        Ok(rows)
    }

    fn insert_into(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        row: &[u8],
    ) -> Result<Option<(RowId, Vec<PageRef>)>> {
        let page = pool.fetch_page(tid, page_id, LockMode::Exclusive)?;
        let slot = HeapPage::new(page.write().as_mut_slice()).insert(row);

        Ok(slot.map(|slot| (RowId::new(page_id, slot), vec![page])))
    }

    fn corrupted(&self, page_id: PageId, detail: impl Into<String>) -> Error {
        Error::Corrupted {
            page_id,
            detail: detail.into(),
        }
    }
}

impl<S: PageStore> TableStorage for HeapTable<S> {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.store.page_size()
    }

    fn read_page(&self, page_id: PageId) -> Result<PageData> {
        let data = self.store.read_page(page_id)?;
        let header = PageHeader::from_bytes(data.as_slice());

        if header.page_type != PageType::Heap {
            return Err(self.corrupted(page_id, "not a heap page"));
        }
        if !header.verify_checksum(data.as_slice()) {
            return Err(self.corrupted(page_id, "checksum mismatch"));
        }
        if header.row_width != self.row_width {
            return Err(self.corrupted(
                page_id,
                format!(
                    "row width {} does not match table row width {}",
                    header.row_width, self.row_width
                ),
            ));
        }

        Ok(data)
    }

    fn write_page(&self, page_id: PageId, data: &PageData) -> Result<()> {
        let mut stamped = data.duplicate();
        PageHeader::stamp_checksum(stamped.as_mut_slice());
        self.store.write_page(page_id, &stamped)
    }

    fn page_count(&self) -> Result<u32> {
        self.store.page_count()
    }

    fn insert_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row: &[u8],
    ) -> Result<(RowId, Vec<PageRef>)> {
        if row.len() != self.row_width() {
            return Err(Error::InvalidRow {
                expected: self.row_width(),
                actual: row.len(),
            });
        }

        // A concurrent inserter may fill the appended page before we lock
        // it, in which case we scan again.
        loop {
            for page_no in 0..self.store.page_count()? {
                let page_id = PageId::new(self.table_id, page_no);
                let page = pool.fetch_page(tid, page_id, LockMode::Shared)?;
                if !HeapPage::new(page.read().as_slice()).has_free_slot() {
                    continue;
                }
                if let Some(inserted) = self.insert_into(pool, tid, page_id, row)? {
                    return Ok(inserted);
                }
            }

            let page_id = self.append_empty_page()?;
            tracing::debug!(%tid, %page_id, "appended heap page");
            if let Some(inserted) = self.insert_into(pool, tid, page_id, row)? {
                return Ok(inserted);
            }
        }
    }

    fn delete_row(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        row_id: RowId,
    ) -> Result<Vec<PageRef>> {
        if row_id.page_id.table_id != self.table_id {
            return Err(Error::RowNotFound(row_id));
        }

        let page = pool.fetch_page(tid, row_id.page_id, LockMode::Exclusive)?;
        let deleted = HeapPage::new(page.write().as_mut_slice()).delete(row_id.slot);
        if !deleted {
            return Err(Error::RowNotFound(row_id));
        }

        Ok(vec![page])
    }
}
