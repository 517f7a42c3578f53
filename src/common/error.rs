//! Error types for lockstepdb.

use thiserror::Error;

use crate::common::{PageId, RowId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in lockstepdb.
///
/// Callers decide what to do by kind: a [`Error::DeadlockAbort`] means the
/// whole transaction should be rolled back and may be retried from scratch,
/// everything else means give up.
#[derive(Debug, Error)]
pub enum Error {
    /// The requesting transaction closed a cycle in the wait-for graph.
    ///
    /// Retrying just the page request is never safe; the caller must
    /// complete the transaction with `commit = false` and start over.
    #[error("{tid} aborted: deadlock while waiting for {page_id}")]
    DeadlockAbort { tid: TransactionId, page_id: PageId },

    /// Every cached page is dirty, so nothing can be evicted (no-steal).
    #[error("buffer pool exhausted: all {capacity} cached pages are dirty")]
    ResourceExhausted { capacity: usize },

    /// I/O error from the storage adapter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in its table.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Page bytes read from storage failed validation.
    #[error("{page_id} is corrupted: {detail}")]
    Corrupted { page_id: PageId, detail: String },

    /// No storage adapter is registered for the table.
    #[error("{0} is not registered")]
    TableNotFound(TableId),

    /// The row slot is empty or out of range.
    #[error("{0} does not exist")]
    RowNotFound(RowId),

    /// A row does not match the table's fixed row width.
    #[error("row has {actual} bytes, table expects {expected}")]
    InvalidRow { expected: usize, actual: usize },

    /// A configuration value cannot back a working pool or store.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An internal contract was broken, e.g. aborting a dirty page that has
    /// no before-image. Indicates a bug, not a runtime condition.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// True for [`Error::DeadlockAbort`].
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Error::DeadlockAbort { .. })
    }

    /// True for [`Error::ResourceExhausted`].
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }

    /// True for failures that originate in the storage adapter.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::PageNotFound(_) | Error::Corrupted { .. }
        )
    }

    /// Whether rerunning the whole transaction can succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_deadlock()
    }
}
