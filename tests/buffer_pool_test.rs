//! Integration tests for the buffer pool: caching, no-steal, commit/abort.

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use lockstepdb::storage::HeapPage;
use lockstepdb::{
    BufferPool, Error, FileStore, HeapTable, LockMode, Mutation, PageId, StatsSnapshot, TableStorage,
    TransactionId,
};
use tempfile::tempdir;

fn page(n: u32) -> PageId {
    PageId::new(TABLE, n)
}

/// Rows currently on storage for `page_id`, bypassing the cache.
fn stored_rows(table: &dyn TableStorage, page_id: PageId) -> usize {
    let data = table.read_page(page_id).unwrap();
    HeapPage::new(data.as_slice()).used_slots()
}

// ============================================================================
// Capacity and eviction
// ============================================================================

#[test]
fn test_capacity_one_evicts_clean_page() {
    let (pool, table) = memory_pool(1);
    table.append_empty_page().unwrap();
    table.append_empty_page().unwrap();
    let tid = TransactionId::new();

    pool.fetch_page(tid, page(0), LockMode::Shared).unwrap();
    pool.fetch_page(tid, page(1), LockMode::Shared).unwrap();

    assert_eq!(pool.cached_pages(), 1);
    assert!(pool.is_cached(page(1)));
    assert_eq!(pool.stats().snapshot().evictions, 1);
    pool.complete_transaction(tid, true).unwrap();
}

#[test]
fn test_capacity_one_dirty_page_blocks_loads() {
    let (pool, table) = memory_pool(1);
    table.append_empty_page().unwrap();
    table.append_empty_page().unwrap();

    let writer = TransactionId::new();
    let row_id = insert(&pool, writer, 1).unwrap();
    assert_eq!(row_id.page_id, page(0));

    let err = pool
        .fetch_page(writer, page(1), LockMode::Shared)
        .unwrap_err();
    assert!(err.is_resource_exhausted());
    assert!(matches!(err, Error::ResourceExhausted { capacity: 1 }));

    pool.complete_transaction(writer, true).unwrap();

    // Committed means clean, so the page can make room now.
    let reader = TransactionId::new();
    pool.fetch_page(reader, page(1), LockMode::Shared).unwrap();
    pool.complete_transaction(reader, true).unwrap();
}

#[test]
fn test_cache_never_exceeds_capacity() {
    let (pool, table) = memory_pool(3);
    for _ in 0..10 {
        table.append_empty_page().unwrap();
    }

    let tid = TransactionId::new();
    for n in 0..10 {
        pool.fetch_page(tid, page(n), LockMode::Shared).unwrap();
        assert!(pool.cached_pages() <= pool.capacity());
    }
    assert_eq!(pool.stats().snapshot().evictions, 7);
    pool.complete_transaction(tid, true).unwrap();
}

// ============================================================================
// No-steal, commit and abort
// ============================================================================

#[test]
fn test_uncommitted_changes_stay_off_storage() {
    let (pool, table) = memory_pool(4);
    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 3).unwrap();

    assert_eq!(stored_rows(&*table, row_id.page_id), 0);

    pool.complete_transaction(tid, true).unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 1);
}

#[test]
fn test_abort_round_trip() {
    let (pool, table) = memory_pool(4);

    let setup = TransactionId::new();
    let kept = insert(&pool, setup, 1).unwrap();
    pool.complete_transaction(setup, true).unwrap();
    let before = committed_rows(&pool, &table);

    let tid = TransactionId::new();
    insert(&pool, tid, 2).unwrap();
    delete(&pool, tid, kept).unwrap();
    pool.complete_transaction(tid, false).unwrap();

    assert_eq!(committed_rows(&pool, &table), before);
    assert_eq!(before, vec![(kept, row(1))]);
    assert_eq!(stored_rows(&*table, kept.page_id), 1);
}

#[test]
fn test_abort_after_flush_all_rewrites_storage() {
    let (pool, table) = memory_pool(1);
    table.append_empty_page().unwrap();
    table.append_empty_page().unwrap();

    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 7).unwrap();

    pool.flush_all().unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 1);

    // Storage holds uncommitted data, so the frame must stay cached.
    let other = TransactionId::new();
    let err = pool.fetch_page(other, page(1), LockMode::Shared).unwrap_err();
    assert!(err.is_resource_exhausted());
    pool.complete_transaction(other, false).unwrap();

    pool.complete_transaction(tid, false).unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 0);
    assert!(committed_rows(&pool, &table).is_empty());
}

#[test]
fn test_commit_after_flush_pages() {
    let (pool, table) = memory_pool(4);
    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 4).unwrap();

    pool.flush_pages(tid).unwrap();
    pool.complete_transaction(tid, true).unwrap();

    assert_eq!(stored_rows(&*table, row_id.page_id), 1);
    assert_eq!(committed_rows(&pool, &table), vec![(row_id, row(4))]);
}

#[test]
fn test_rows_spill_to_new_pages() {
    let (pool, table) = memory_pool(8);
    let tid = TransactionId::new();
    let total = ROWS_PER_PAGE * 2 + 3;
    for i in 0..total {
        insert(&pool, tid, i as u8).unwrap();
    }
    pool.complete_transaction(tid, true).unwrap();

    assert_eq!(table.page_count().unwrap(), 3);
    assert_eq!(committed_rows(&pool, &table).len(), total);
}

#[test]
fn test_delete_committed_row() {
    let (pool, table) = memory_pool(4);
    let setup = TransactionId::new();
    let row_id = insert(&pool, setup, 9).unwrap();
    pool.complete_transaction(setup, true).unwrap();

    let tid = TransactionId::new();
    delete(&pool, tid, row_id).unwrap();
    pool.complete_transaction(tid, true).unwrap();

    assert!(committed_rows(&pool, &table).is_empty());
}

#[test]
fn test_invalid_row_width() {
    let (pool, _table) = memory_pool(4);
    let tid = TransactionId::new();
    let err = pool
        .apply_mutation(tid, TABLE, Mutation::Insert { row: vec![0; ROW + 1] })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRow { expected: ROW, actual } if actual == ROW + 1));
    pool.complete_transaction(tid, false).unwrap();
}

#[test]
fn test_commit_durable_across_reopen() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("t1.tbl");

    let row_id = {
        let pool = BufferPool::new(config(4)).unwrap();
        let store = FileStore::create(&path, PAGE).unwrap();
        pool.register_table(Arc::new(HeapTable::new(TABLE, ROW, store).unwrap()))
            .unwrap();

        let tid = TransactionId::new();
        let row_id = insert(&pool, tid, 0x5A).unwrap();
        pool.complete_transaction(tid, true).unwrap();
        row_id
    };

    let pool = BufferPool::new(config(4)).unwrap();
    let table = Arc::new(HeapTable::new(TABLE, ROW, FileStore::open(&path, PAGE).unwrap()).unwrap());
    pool.register_table(table.clone()).unwrap();

    let tid = TransactionId::new();
    assert_eq!(table.scan(&pool, tid).unwrap(), vec![(row_id, row(0x5A))]);
    pool.complete_transaction(tid, true).unwrap();
}

// ============================================================================
// Locking through the pool
// ============================================================================

#[test]
fn test_shared_locks_do_not_block() {
    let (pool, table) = memory_pool(4);
    table.append_empty_page().unwrap();
    let first = TransactionId::new();
    pool.fetch_page(first, page(0), LockMode::Shared).unwrap();

    let (tx, rx) = mpsc::channel();
    let pool2 = Arc::clone(&pool);
    let handle = thread::spawn(move || {
        let second = TransactionId::new();
        let result = pool2.fetch_page(second, page(0), LockMode::Shared).map(|_| ());
        tx.send(result.is_ok()).unwrap();
        pool2.complete_transaction(second, true).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    handle.join().unwrap();
    pool.complete_transaction(first, true).unwrap();
}

#[test]
fn test_exclusive_lock_blocks_until_commit() {
    let (pool, table) = memory_pool(4);
    table.append_empty_page().unwrap();
    let writer = TransactionId::new();
    pool.fetch_page(writer, page(0), LockMode::Exclusive).unwrap();

    let reader = TransactionId::new();
    let pool2 = Arc::clone(&pool);
    let handle = thread::spawn(move || pool2.fetch_page(reader, page(0), LockMode::Shared).map(|_| ()));

    thread::sleep(Duration::from_millis(50));
    assert!(!pool.holds_lock(reader, page(0)));
    assert!(pool.stats().snapshot().lock_waits >= 1);

    pool.complete_transaction(writer, true).unwrap();
    handle.join().unwrap().unwrap();
    assert!(pool.holds_lock(reader, page(0)));
    pool.complete_transaction(reader, true).unwrap();
}

#[test]
fn test_release_page_drops_lock() {
    let (pool, table) = memory_pool(4);
    table.append_empty_page().unwrap();
    let tid = TransactionId::new();

    pool.fetch_page(tid, page(0), LockMode::Exclusive).unwrap();
    assert!(pool.holds_lock(tid, page(0)));
    assert_eq!(pool.lock_manager().held_pages(tid), vec![page(0)]);

    pool.release_page(tid, page(0));
    assert!(!pool.holds_lock(tid, page(0)));
    assert!(pool.lock_manager().held_pages(tid).is_empty());

    // Someone else can take it immediately.
    let other = TransactionId::new();
    pool.fetch_page(other, page(0), LockMode::Exclusive).unwrap();
    pool.complete_transaction(other, true).unwrap();
}

#[test]
fn test_completion_releases_every_lock() {
    let (pool, table) = memory_pool(4);
    for _ in 0..3 {
        table.append_empty_page().unwrap();
    }
    let tid = TransactionId::new();
    pool.fetch_page(tid, page(0), LockMode::Shared).unwrap();
    pool.fetch_page(tid, page(1), LockMode::Exclusive).unwrap();
    pool.fetch_page(tid, page(2), LockMode::Shared).unwrap();
    assert_eq!(pool.lock_manager().active_transactions(), 1);

    pool.complete_transaction(tid, false).unwrap();
    for n in 0..3 {
        assert!(!pool.holds_lock(tid, page(n)));
    }
    assert_eq!(pool.lock_manager().active_transactions(), 0);
}

// ============================================================================
// Storage faults and admin hooks
// ============================================================================

#[test]
fn test_read_fault_propagates() {
    let (pool, table) = memory_pool(4);
    table.append_empty_page().unwrap();
    table.store().set_failing(true);

    let tid = TransactionId::new();
    let err = pool.fetch_page(tid, page(0), LockMode::Shared).unwrap_err();
    assert!(err.is_storage_fault());
    assert!(!err.is_retryable());
    assert!(pool.holds_lock(tid, page(0)));

    pool.complete_transaction(tid, false).unwrap();
    assert!(!pool.holds_lock(tid, page(0)));
}

#[test]
fn test_commit_write_fault_rolls_back_page() {
    let (pool, table) = memory_pool(4);
    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 1).unwrap();

    table.store().set_failing(true);
    let err = pool.complete_transaction(tid, true).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!pool.holds_lock(tid, row_id.page_id));
    assert!(pool.lock_manager().held_pages(tid).is_empty());
    table.store().set_failing(false);

    // The unwritten insert is undone, not left visible in the cache.
    assert!(committed_rows(&pool, &table).is_empty());
    pool.flush_all().unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 0);
}

#[test]
fn test_abort_write_fault_keeps_page_pinned_until_flushed() {
    let (pool, table) = memory_pool(1);
    table.append_empty_page().unwrap();
    table.append_empty_page().unwrap();

    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 7).unwrap();
    pool.flush_all().unwrap();

    table.store().set_failing(true);
    let err = pool.complete_transaction(tid, false).unwrap_err();
    assert!(err.is_storage_fault());
    table.store().set_failing(false);
    assert_eq!(stored_rows(&*table, row_id.page_id), 1);

    // Storage still holds the aborted row, so the frame cannot be evicted.
    let other = TransactionId::new();
    let err = pool.fetch_page(other, page(1), LockMode::Shared).unwrap_err();
    assert!(err.is_resource_exhausted());
    pool.complete_transaction(other, false).unwrap();

    pool.flush_all().unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 0);

    let reader = TransactionId::new();
    pool.fetch_page(reader, page(1), LockMode::Shared).unwrap();
    assert!(!pool.is_cached(row_id.page_id));
    pool.complete_transaction(reader, true).unwrap();
    assert!(committed_rows(&pool, &table).is_empty());
}

#[test]
fn test_commit_write_fault_after_flush_all_keeps_committed_content() {
    let (pool, table) = memory_pool(4);
    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 3).unwrap();
    pool.flush_all().unwrap();
    insert(&pool, tid, 4).unwrap();

    table.store().set_failing(true);
    assert!(pool.complete_transaction(tid, true).is_err());
    table.store().set_failing(false);

    assert!(committed_rows(&pool, &table).is_empty());
    assert_eq!(stored_rows(&*table, row_id.page_id), 1);
    pool.flush_all().unwrap();
    assert_eq!(stored_rows(&*table, row_id.page_id), 0);
}

#[test]
fn test_missing_page() {
    let (pool, _table) = memory_pool(4);
    let tid = TransactionId::new();
    let err = pool.fetch_page(tid, page(5), LockMode::Shared).unwrap_err();
    assert!(matches!(err, Error::PageNotFound(p) if p == page(5)));
    pool.complete_transaction(tid, false).unwrap();
}

#[test]
fn test_discard_page_drops_uncommitted_copy() {
    let (pool, table) = memory_pool(4);
    let tid = TransactionId::new();
    let row_id = insert(&pool, tid, 1).unwrap();
    pool.complete_transaction(tid, true).unwrap();

    pool.discard_page(row_id.page_id);
    assert!(!pool.is_cached(row_id.page_id));

    // Reloaded from storage.
    assert_eq!(committed_rows(&pool, &table), vec![(row_id, row(1))]);
    assert_eq!(pool.stats().snapshot().cache_misses, 2);
}

#[test]
fn test_stats_track_completion_and_reset() {
    let (pool, _table) = memory_pool(4);
    let a = TransactionId::new();
    insert(&pool, a, 1).unwrap();
    pool.complete_transaction(a, true).unwrap();
    let b = TransactionId::new();
    insert(&pool, b, 2).unwrap();
    pool.complete_transaction(b, false).unwrap();

    let stats = pool.stats().snapshot();
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.aborts, 1);
    assert_eq!(stats.pages_written, 1);

    pool.stats().reset();
    assert_eq!(pool.stats().snapshot(), StatsSnapshot::default());
}
