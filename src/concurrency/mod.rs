//! Concurrency control - page-level strict two-phase locking.
//!
//! # Components
//! - [`LockTable`] - shared/exclusive state per page
//! - [`WaitForGraph`] - blocking edges between transactions, cycle search
//! - [`HeldPages`] - which pages each transaction has locked
//! - [`LockManager`] - the blocking acquisition loop over all three

mod held_pages;
mod lock_manager;
mod lock_table;
mod wait_for;

pub use held_pages::HeldPages;
pub use lock_manager::LockManager;
pub use lock_table::{LockState, LockTable, PageLock};
pub use wait_for::WaitForGraph;
