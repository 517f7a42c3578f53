//! Catalog - table id to storage adapter registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result, TableId};
use crate::storage::TableStorage;

/// Maps table ids to the storage adapters that serve them.
///
/// Read-mostly: lookups happen on every cache miss and flush, registration
/// happens once per table.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn TableStorage>>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under its own id, returning any adapter it replaced.
    pub fn add(&self, table: Arc<dyn TableStorage>) -> Option<Arc<dyn TableStorage>> {
        self.tables.write().insert(table.table_id(), table)
    }

    /// Look up the adapter for `table_id`.
    ///
    /// # Errors
    /// `Error::TableNotFound` if nothing is registered under that id.
    pub fn get(&self, table_id: TableId) -> Result<Arc<dyn TableStorage>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::TableNotFound(table_id))
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Whether no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
