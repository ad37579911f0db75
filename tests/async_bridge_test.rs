//! Integration tests for the tokio bridge
//!
//! Blocking pool waits run on tokio's blocking pool; these tests check that
//! async callers see the same acquire, timeout, and shutdown behavior.

#![cfg(feature = "tokio-runtime")]

use coupon_system::builders::build_pool;
use coupon_system::config::PoolConfig;
use coupon_system::core::{Company, CouponError, ResourcePool, StoreBackend};
use coupon_system::infra::{MemoryConnection, MemoryStore};
use coupon_system::runtime::{acquire_async, run_blocking};
use std::sync::Arc;
use std::time::Duration;

fn make_pool(capacity: usize) -> (MemoryStore, Arc<ResourcePool<MemoryConnection>>) {
    let store = MemoryStore::new();
    let cfg = PoolConfig {
        capacity,
        acquire_timeout_ms: None,
        drain_timeout_ms: 100,
    };
    let pool = build_pool(&cfg, |_| store.connect()).unwrap();
    (store, Arc::new(pool))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_acquire_async_and_release() {
    let (_store, pool) = make_pool(2);
    let handle = acquire_async(Arc::clone(&pool), None).await.unwrap();
    assert_eq!(pool.stats().outstanding, 1);
    pool.release(handle).unwrap();
    assert_eq!(pool.stats().available, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_acquire_async_times_out() {
    let (_store, pool) = make_pool(1);
    let _held = pool.acquire().unwrap();
    let err = acquire_async(Arc::clone(&pool), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, CouponError::AcquireTimeout(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_acquire_async_woken_by_release() {
    let (_store, pool) = make_pool(1);
    let held = pool.acquire().unwrap();

    let waiter = tokio::spawn(acquire_async(Arc::clone(&pool), None));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    pool.release(held).unwrap();
    let handle = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    pool.release(handle).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_acquire_async_sees_shutdown() {
    let (_store, pool) = make_pool(1);
    let held = pool.acquire().unwrap();
    let waiter = tokio::spawn(acquire_async(Arc::clone(&pool), None));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let closer = Arc::clone(&pool);
    run_blocking(move || {
        closer.shutdown();
        Ok(())
    })
    .await
    .unwrap();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(CouponError::PoolClosed)));
    drop(held);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_blocking_repository_call() {
    let (store, pool) = make_pool(2);
    let repos = store.repositories(&pool);

    let writer = repos.clone();
    run_blocking(move || writer.companies.create(&Company::new(1, "acme", "pw", "a@acme.test")))
        .await
        .unwrap();
    let companies = run_blocking(move || repos.companies.get_all()).await.unwrap();
    assert_eq!(companies.len(), 1);
}
