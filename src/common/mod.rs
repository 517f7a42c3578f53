//! Common types and utilities shared across lockstepdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration
//! - Error types
//! - Identifiers (TableId, PageId, RowId, TransactionId) and LockMode

pub mod config;
pub mod error;
mod page_id;
mod txn_id;

pub use config::BufferPoolConfig;
pub use error::{Error, Result};
pub use page_id::{PageId, RowId, TableId};
pub use txn_id::{LockMode, TransactionId};
