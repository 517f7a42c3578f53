//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between transactions and table
//! storage. It caches a bounded number of pages and ties page access to
//! the lock manager, so every fetch is also a lock request.
//!
//! # Components
//! - [`BufferPool`] - The coordinator: fetch, mutate, commit/abort
//! - [`PageCache`] - Bounded `PageId -> Frame` map, no-steal eviction
//! - [`Frame`] - A cached page + dirty state + before-image
//! - [`BufferPoolStats`] - Performance statistics

mod buffer_pool;
mod frame;
mod page_cache;
mod stats;

pub use buffer_pool::{BufferPool, Mutation};
pub use frame::{Frame, PageRef};
pub use page_cache::PageCache;
pub use stats::{BufferPoolStats, StatsSnapshot};
