//! lockstepdb - a page buffer pool with integrated two-phase locking.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     transactions (threads)                      │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │             Buffer Pool (buffer/)                       │   │
//! │  │   fetch_page · apply_mutation · complete_transaction    │   │
//! │  │      PageCache (no-steal) + Frame (before-images)       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Concurrency (concurrency/)                     │   │
//! │  │   LockTable + WaitForGraph + HeldPages = LockManager    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │             Storage Layer (storage/)                    │   │
//! │  │   TableStorage: HeapTable over FileStore | MemoryStore  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, LockMode, Error, config)
//! - [`buffer`] - The buffer pool, its cache and statistics
//! - [`concurrency`] - Page locks and deadlock detection
//! - [`storage`] - Page stores, heap page format and tables
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use lockstepdb::{BufferPool, BufferPoolConfig, FileStore, HeapTable, Mutation};
//! use lockstepdb::{TableId, TransactionId, PAGE_SIZE};
//!
//! let pool = BufferPool::new(BufferPoolConfig::default())?;
//! let store = FileStore::open_or_create("accounts.tbl", PAGE_SIZE)?;
//! pool.register_table(Arc::new(HeapTable::new(TableId::new(1), 64, store)?))?;
//!
//! let tid = TransactionId::new();
//! match pool.apply_mutation(tid, TableId::new(1), Mutation::Insert { row: vec![0; 64] }) {
//!     Ok(_) => pool.complete_transaction(tid, true)?,
//!     Err(e) if e.is_retryable() => pool.complete_transaction(tid, false)?,
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), lockstepdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, LockMode, PageId, Result, RowId, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, Frame, Mutation, PageRef, StatsSnapshot};
pub use concurrency::LockManager;
pub use storage::{FileStore, HeapTable, MemoryStore, PageData, PageStore, TableStorage};
