//! Table, page and row identifier types.

use std::fmt;

/// Identifies a table (one heap file).
///
/// # Example
/// ```
/// use lockstepdb::TableId;
///
/// let table = TableId::new(7);
/// assert_eq!(table.0, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(id: u32) -> Self {
        TableId(id)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page: the table it belongs to plus its position in that
/// table.
///
/// This is the key of both the page cache and the lock table.
///
/// # Example
/// ```
/// use lockstepdb::{PageId, TableId};
///
/// let page_id = PageId::new(TableId::new(1), 42);
/// assert_eq!(page_id.table_id, TableId::new(1));
/// assert_eq!(page_id.page_no, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    /// Table the page belongs to.
    pub table_id: TableId,
    /// Page number within the table, starting at 0.
    pub page_no: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_no)
    }
}

/// Address of one row slot on a heap page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    /// Page holding the row.
    pub page_id: PageId,
    /// Slot index within the page.
    pub slot: u16,
}

impl RowId {
    /// Create a new RowId.
    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row({}:{}:{})",
            self.page_id.table_id.0, self.page_id.page_no, self.slot
        )
    }
}
