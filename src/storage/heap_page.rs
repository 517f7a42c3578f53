//! Heap page layout: header, occupancy bitmap and fixed-width row slots.
//!
//! Every heap page starts with a [`PageHeader`] containing:
//! - [`PageType`] discriminator
//! - CRC32 checksum for integrity
//! - Row width and slot count

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Slotted heap page holding fixed-width rows.
    Heap = 1,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Heap,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every heap page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       2     row_width (little-endian)
/// 7       2     slot_count (little-endian)
/// ```
///
/// The header is followed by an occupancy bitmap of `ceil(slot_count / 8)`
/// bytes (bit `i` set = slot `i` used) and then `slot_count` row slots of
/// `row_width` bytes each.
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself set to zero. It is stamped when a page is written to storage and
/// verified when it is read back; the cached copy may carry a stale value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
    /// Width of every row slot in bytes.
    pub row_width: u16,
    /// Number of row slots on the page.
    pub slot_count: u16,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_ROW_WIDTH: usize = 5;
    pub const OFFSET_SLOT_COUNT: usize = 7;

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);
        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);
        let row_width = u16::from_le_bytes([
            data[Self::OFFSET_ROW_WIDTH],
            data[Self::OFFSET_ROW_WIDTH + 1],
        ]);
        let slot_count = u16::from_le_bytes([
            data[Self::OFFSET_SLOT_COUNT],
            data[Self::OFFSET_SLOT_COUNT + 1],
        ]);

        Self {
            page_type,
            checksum,
            row_width,
            slot_count,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_ROW_WIDTH..Self::OFFSET_ROW_WIDTH + 2]
            .copy_from_slice(&self.row_width.to_le_bytes());
        data[Self::OFFSET_SLOT_COUNT..Self::OFFSET_SLOT_COUNT + 2]
            .copy_from_slice(&self.slot_count.to_le_bytes());
    }

    /// Compute CRC32 checksum of a page, treating the checksum field as zero.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }

    /// Compute the checksum of `page_data` and store it in its header.
    pub fn stamp_checksum(page_data: &mut [u8]) {
        let checksum = Self::compute_checksum(page_data);
        page_data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }
}

/// Number of `row_width`-byte slots that fit on a page of `page_size` bytes.
///
/// Each slot costs `row_width` bytes plus one bitmap bit:
/// `floor((page_size - header) * 8 / (row_width * 8 + 1))`.
pub fn slots_per_page(page_size: usize, row_width: usize) -> usize {
    if row_width == 0 || page_size <= PageHeader::SIZE {
        return 0;
    }
    ((page_size - PageHeader::SIZE) * 8) / (row_width * 8 + 1)
}

/// A view over heap page bytes.
///
/// Works over `&[u8]` for reads and `&mut [u8]` for edits:
/// ```
/// use lockstepdb::storage::heap_page::HeapPage;
///
/// let mut bytes = vec![0u8; 128];
/// let mut page = HeapPage::format(bytes.as_mut_slice(), 4);
/// let slot = page.insert(b"abcd").unwrap();
/// assert_eq!(page.row(slot), Some(&b"abcd"[..]));
/// ```
pub struct HeapPage<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> HeapPage<B> {
    /// Wrap already formatted page bytes.
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    /// Decode the header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(self.buf.as_ref())
    }

    /// Number of row slots on this page.
    pub fn slot_count(&self) -> u16 {
        self.header().slot_count
    }

    /// Width of each row in bytes.
    pub fn row_width(&self) -> usize {
        self.header().row_width as usize
    }

    fn bitmap_len(&self) -> usize {
        (self.slot_count() as usize).div_ceil(8)
    }

    fn slot_offset(&self, slot: u16) -> usize {
        PageHeader::SIZE + self.bitmap_len() + slot as usize * self.row_width()
    }

    /// Whether `slot` currently holds a row. Out-of-range slots are unused.
    pub fn is_used(&self, slot: u16) -> bool {
        if slot >= self.slot_count() {
            return false;
        }
        let byte = self.buf.as_ref()[PageHeader::SIZE + slot as usize / 8];
        byte & (1 << (slot % 8)) != 0
    }

    /// Row stored in `slot`, if any.
    pub fn row(&self, slot: u16) -> Option<&[u8]> {
        if !self.is_used(slot) {
            return None;
        }
        let start = self.slot_offset(slot);
        Some(&self.buf.as_ref()[start..start + self.row_width()])
    }

    /// All used slots with their rows, in slot order.
    pub fn rows(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        (0..self.slot_count()).filter_map(move |slot| self.row(slot).map(|row| (slot, row)))
    }

    /// Number of used slots.
    pub fn used_slots(&self) -> usize {
        (0..self.slot_count()).filter(|&slot| self.is_used(slot)).count()
    }

    /// Whether an insert would succeed.
    pub fn has_free_slot(&self) -> bool {
        self.used_slots() < self.slot_count() as usize
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeapPage<B> {
    /// Zero `buf` and lay out an empty heap page for `row_width`-byte rows.
    pub fn format(mut buf: B, row_width: u16) -> Self {
        let bytes = buf.as_mut();
        bytes.fill(0);
        let header = PageHeader {
            page_type: PageType::Heap,
            checksum: 0,
            row_width,
            slot_count: slots_per_page(bytes.len(), row_width as usize) as u16,
        };
        header.write_to(bytes);
        Self { buf }
    }

    /// Store `row` in the first free slot and return that slot.
    ///
    /// Returns `None` when the page is full. The caller checks the row
    /// width against the table.
    pub fn insert(&mut self, row: &[u8]) -> Option<u16> {
        debug_assert_eq!(row.len(), self.row_width());
        let slot = (0..self.slot_count()).find(|&slot| !self.is_used(slot))?;
        let start = self.slot_offset(slot);
        self.buf.as_mut()[start..start + row.len()].copy_from_slice(row);
        self.set_used(slot, true);
        Some(slot)
    }

    /// Clear `slot`. Returns false if it held no row.
    pub fn delete(&mut self, slot: u16) -> bool {
        if !self.is_used(slot) {
            return false;
        }
        let start = self.slot_offset(slot);
        let width = self.row_width();
        self.buf.as_mut()[start..start + width].fill(0);
        self.set_used(slot, false);
        true
    }

    fn set_used(&mut self, slot: u16, used: bool) {
        let byte = &mut self.buf.as_mut()[PageHeader::SIZE + slot as usize / 8];
        if used {
            *byte |= 1 << (slot % 8);
        } else {
            *byte &= !(1 << (slot % 8));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
