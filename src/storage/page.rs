//! PageData - the raw bytes of one page.
//!
//! A [`PageData`] is the unit of I/O between storage and the buffer pool.
//! Its length is fixed by the configured page size.

use std::fmt;

/// The bytes of one page.
///
/// # Copying
/// `PageData` does NOT implement `Clone`: copying a page is expensive and
/// should be visible at the call site. Use [`PageData::duplicate`] (taking
/// a before-image is the main caller).
///
/// # Example
/// ```
/// use lockstepdb::storage::PageData;
///
/// let mut page = PageData::zeroed(4096);
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[0], 0xFF);
/// assert_eq!(page.len(), 4096);
/// ```
#[derive(PartialEq, Eq)]
pub struct PageData {
    bytes: Box<[u8]>,
}

impl PageData {
    /// Create a zeroed page of `page_size` bytes.
    pub fn zeroed(page_size: usize) -> Self {
        Self {
            bytes: vec![0u8; page_size].into_boxed_slice(),
        }
    }

    /// Wrap bytes read from storage.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Page size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for pages built from a validated page size.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    /// Explicit deep copy.
    pub fn duplicate(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }

    /// Overwrite this page with the contents of `other`.
    ///
    /// # Panics
    /// Panics if the two pages differ in size.
    pub fn copy_from(&mut self, other: &PageData) {
        self.bytes.copy_from_slice(&other.bytes);
    }
}

impl fmt::Debug for PageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageData").field("len", &self.len()).finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
