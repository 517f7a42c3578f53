//! Configuration for lockstepdb.

use std::time::Duration;

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every [`BufferPool`] and every
/// store attached to it must agree on the page size; see
/// [`BufferPoolConfig::with_page_size`] for the test override.
///
/// [`BufferPool`]: crate::buffer::BufferPool
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Default upper bound on how long a blocked lock request sleeps before it
/// re-runs deadlock detection, even without a release notification.
pub const DEFAULT_LOCK_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Smallest page size accepted by [`BufferPoolConfig::validate`].
///
/// A heap page needs room for its header, a bitmap byte and one row.
pub const MIN_PAGE_SIZE: usize = 64;

/// Largest page size accepted by [`BufferPoolConfig::validate`].
///
/// Slot counts are stored as `u16` in the heap page header.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Buffer pool configuration.
///
/// # Example
/// ```
/// use lockstepdb::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new(8);
/// assert_eq!(config.pool_pages, 8);
/// assert_eq!(config.page_size, lockstepdb::PAGE_SIZE);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Maximum number of pages resident in the cache.
    pub pool_pages: usize,

    /// Size of every page in bytes.
    pub page_size: usize,

    /// How long a blocked lock request sleeps between deadlock checks.
    pub lock_wait_interval: Duration,
}

impl BufferPoolConfig {
    /// Create a config caching up to `pool_pages` pages, other settings at
    /// their defaults.
    pub fn new(pool_pages: usize) -> Self {
        Self {
            pool_pages,
            ..Self::default()
        }
    }

    /// Override the page size.
    ///
    /// Intended for tests that want tiny pages so a handful of rows spill
    /// over several pages. Production pools use [`PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the lock wait re-check interval.
    pub fn with_lock_wait_interval(mut self, interval: Duration) -> Self {
        self.lock_wait_interval = interval;
        self
    }

    /// Check that the configuration can back a working pool.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` describing the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.pool_pages == 0 {
            return Err(Error::InvalidConfig("pool_pages must be > 0".into()));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidConfig(format!(
                "page_size {} outside [{}, {}]",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        if self.lock_wait_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "lock_wait_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_pages: DEFAULT_POOL_PAGES,
            page_size: PAGE_SIZE,
            lock_wait_interval: DEFAULT_LOCK_WAIT_INTERVAL,
        }
    }
}
