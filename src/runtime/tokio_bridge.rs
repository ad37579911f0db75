//! Tokio bridge for the blocking pool and repository calls.
//!
//! Pool waits park an OS thread on a `parking_lot::Condvar`, so they are moved
//! onto tokio's blocking thread pool instead of stalling a runtime worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::core::error::{CouponError, CouponResult};
use crate::core::resource_pool::{Connection, Handle, ResourcePool};

/// Acquire a handle without blocking the async runtime.
///
/// With `timeout` set this behaves like [`ResourcePool::acquire_timeout`],
/// otherwise like [`ResourcePool::acquire`]. If the returned future is
/// dropped before the handle arrives, the handle goes straight back to the pool.
///
/// # Errors
///
/// `PoolClosed`, `AcquireTimeout`, or `Internal` if the blocking task died.
pub async fn acquire_async<C: Connection>(
    pool: Arc<ResourcePool<C>>,
    timeout: Option<Duration>,
) -> CouponResult<Handle<C>> {
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let result = match timeout {
            Some(timeout) => pool.acquire_timeout(timeout),
            None => pool.acquire(),
        };
        if let Err(Ok(handle)) = tx.send(result) {
            debug!(slot = handle.slot(), "async acquirer gone; returning handle");
            let _ = pool.release(handle);
        }
    });

    rx.await
        .map_err(|_| CouponError::Internal("blocking acquire task ended without a result".into()))?
}

/// Run a blocking repository or facade call on tokio's blocking pool.
///
/// # Errors
///
/// The call's own error, or `Internal` if the task panicked.
pub async fn run_blocking<T, F>(f: F) -> CouponResult<T>
where
    F: FnOnce() -> CouponResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CouponError::Internal(format!("blocking task failed: {e}")))?
}
