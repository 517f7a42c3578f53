//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use lockstepdb::{
    BufferPool, BufferPoolConfig, HeapTable, MemoryStore, Mutation, Result, RowId, TableId,
    TransactionId,
};
use tracing_subscriber::EnvFilter;

/// Small pages so a handful of rows spread over several pages.
pub const PAGE: usize = 128;
pub const ROW: usize = 8;
pub const TABLE: TableId = TableId(1);

/// Rows that fit on one `PAGE`-sized heap page with `ROW`-byte rows.
pub const ROWS_PER_PAGE: usize = 14;

/// Install a subscriber once per test binary; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(pool_pages: usize) -> BufferPoolConfig {
    BufferPoolConfig::new(pool_pages).with_page_size(PAGE)
}

/// A pool with one in-memory heap table registered as `TABLE`.
pub fn memory_pool(pool_pages: usize) -> (Arc<BufferPool>, Arc<HeapTable<MemoryStore>>) {
    init_tracing();
    let pool = BufferPool::new(config(pool_pages)).unwrap();
    let table = Arc::new(HeapTable::new(TABLE, ROW, MemoryStore::new(PAGE)).unwrap());
    pool.register_table(table.clone()).unwrap();
    (Arc::new(pool), table)
}

pub fn row(byte: u8) -> Vec<u8> {
    vec![byte; ROW]
}

pub fn insert(pool: &BufferPool, tid: TransactionId, byte: u8) -> Result<RowId> {
    let row_id = pool.apply_mutation(tid, TABLE, Mutation::Insert { row: row(byte) })?;
    Ok(row_id.expect("insert returns a row id"))
}

pub fn delete(pool: &BufferPool, tid: TransactionId, row_id: RowId) -> Result<()> {
    pool.apply_mutation(tid, TABLE, Mutation::Delete { row_id })?;
    Ok(())
}

/// Row contents visible to a fresh transaction, sorted by row id.
pub fn committed_rows(pool: &BufferPool, table: &HeapTable<MemoryStore>) -> Vec<(RowId, Vec<u8>)> {
    let tid = TransactionId::new();
    let mut rows = table.scan(pool, tid).unwrap();
    pool.complete_transaction(tid, true).unwrap();
    rows.sort();
    rows
}
