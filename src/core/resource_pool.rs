//! Fixed-capacity pool of store connections.
//!
//! The pool owns `capacity` live handles opened at construction. Borrowers
//! block in [`ResourcePool::acquire`] until a handle is free and give it back
//! with [`ResourcePool::release`] (or by dropping a [`PooledConnection`]).
//! [`ResourcePool::shutdown`] is terminal: pending and future acquires fail
//! with [`CouponError::PoolClosed`], idle handles are closed at once and
//! borrowed handles are closed as they come back, within a bounded drain
//! window.
//!
//! All state lives behind a single `parking_lot::Mutex`. Two `Condvar`s hang
//! off it: `handle_available` wakes one blocked acquirer per release, and
//! `handle_returned` wakes the shutdown drain.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{CouponError, CouponResult};

/// A live connection to the backing store.
pub trait Connection: Send + 'static {
    /// Close the connection. Called exactly once, by the pool.
    ///
    /// # Errors
    ///
    /// Returns the store's close failure; the pool logs it and moves on.
    fn close(&mut self) -> CouponResult<()>;
}

/// Configuration values for capacity enforcement.
#[derive(Debug, Clone)]
pub struct PoolLimits {
    /// Number of handles opened at construction.
    pub capacity: usize,
    /// Default wait used by [`ResourcePool::get`]; `None` waits forever.
    pub acquire_timeout: Option<Duration>,
    /// How long shutdown waits for borrowed handles to come back.
    pub drain_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            capacity: 10,
            acquire_timeout: None,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle phase of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPhase {
    /// Handing out handles.
    Open,
    /// Shutdown started; waiting for borrowed handles.
    Draining,
    /// Terminal.
    Closed,
}

/// Snapshot of pool utilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    /// Fixed number of handles.
    pub capacity: usize,
    /// Handles idle in the pool.
    pub available: usize,
    /// Handles checked out.
    pub outstanding: usize,
    /// Highest `outstanding` seen since construction.
    pub peak_outstanding: usize,
    /// Handles closed by shutdown so far.
    pub closed_handles: usize,
    /// Current phase.
    pub phase: PoolPhase,
}

/// Outcome of [`ResourcePool::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Handles closed during this call.
    pub closed: usize,
    /// Handles still borrowed when the drain window ended.
    pub leaked: usize,
    /// False when the pool had already been shut down.
    pub first_call: bool,
}

/// A borrowed connection. Only its pool can take it back.
pub struct Handle<C> {
    slot: usize,
    pool_id: Uuid,
    conn: C,
}

impl<C> Handle<C> {
    /// Slot number within the owning pool.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Identity of the owning pool.
    #[must_use]
    pub const fn pool_id(&self) -> Uuid {
        self.pool_id
    }
}

impl<C> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("slot", &self.slot)
            .field("pool_id", &self.pool_id)
            .finish_non_exhaustive()
    }
}

impl<C> Deref for Handle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C> DerefMut for Handle<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

struct PoolState<C> {
    available: Vec<Handle<C>>,
    outstanding: HashSet<usize>,
    phase: PoolPhase,
    peak_outstanding: usize,
    closed_handles: usize,
}

/// Bounded blocking pool of store connections.
pub struct ResourcePool<C: Connection> {
    id: Uuid,
    limits: PoolLimits,
    state: Mutex<PoolState<C>>,
    /// Signaled once per release while open, broadcast on shutdown.
    handle_available: Condvar,
    /// Signaled when a handle comes back during the drain.
    handle_returned: Condvar,
}

impl<C: Connection> ResourcePool<C> {
    /// Build a pool from already-opened connections.
    ///
    /// `limits.capacity` is taken from `connections.len()`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `connections` is empty.
    pub fn new(limits: PoolLimits, connections: Vec<C>) -> CouponResult<Self> {
        if connections.is_empty() {
            return Err(CouponError::InvalidConfig(
                "pool needs at least one connection".into(),
            ));
        }
        let id = Uuid::new_v4();
        let available: Vec<Handle<C>> = connections
            .into_iter()
            .enumerate()
            .map(|(slot, conn)| Handle {
                slot,
                pool_id: id,
                conn,
            })
            .collect();
        let limits = PoolLimits {
            capacity: available.len(),
            ..limits
        };

        info!(
            pool_id = %id,
            capacity = limits.capacity,
            "connection pool opened"
        );

        Ok(Self {
            id,
            limits,
            state: Mutex::new(PoolState {
                available,
                outstanding: HashSet::new(),
                phase: PoolPhase::Open,
                peak_outstanding: 0,
                closed_handles: 0,
            }),
            handle_available: Condvar::new(),
            handle_returned: Condvar::new(),
        })
    }

    /// Pool identity.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Limits this pool was built with.
    #[must_use]
    pub const fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    /// Block until a handle is free.
    ///
    /// # Errors
    ///
    /// `PoolClosed` if the pool is shut down before or while waiting.
    pub fn acquire(&self) -> CouponResult<Handle<C>> {
        self.acquire_until(None)
    }

    /// Like [`acquire`](Self::acquire), giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// `PoolClosed` on shutdown, `AcquireTimeout` when the wait runs out.
    pub fn acquire_timeout(&self, timeout: Duration) -> CouponResult<Handle<C>> {
        self.acquire_until(Some((Instant::now() + timeout, timeout)))
    }

    fn acquire_until(&self, deadline: Option<(Instant, Duration)>) -> CouponResult<Handle<C>> {
        let mut state = self.state.lock();
        loop {
            if state.phase != PoolPhase::Open {
                return Err(CouponError::PoolClosed);
            }
            if let Some(handle) = state.available.pop() {
                state.outstanding.insert(handle.slot);
                state.peak_outstanding = state.peak_outstanding.max(state.outstanding.len());
                debug!(slot = handle.slot, outstanding = state.outstanding.len(), "handle acquired");
                return Ok(handle);
            }
            match deadline {
                None => self.handle_available.wait(&mut state),
                Some((at, timeout)) => {
                    let timed_out = self.handle_available.wait_until(&mut state, at).timed_out();
                    if timed_out && state.available.is_empty() && state.phase == PoolPhase::Open {
                        return Err(CouponError::AcquireTimeout(timeout));
                    }
                }
            }
        }
    }

    /// Borrow a handle wrapped in a guard that releases it on drop.
    ///
    /// Honours `limits.acquire_timeout` when set.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire) / [`acquire_timeout`](Self::acquire_timeout).
    pub fn get(&self) -> CouponResult<PooledConnection<'_, C>> {
        let handle = match self.limits.acquire_timeout {
            Some(timeout) => self.acquire_timeout(timeout)?,
            None => self.acquire()?,
        };
        Ok(PooledConnection {
            pool: self,
            handle: Some(handle),
        })
    }

    /// Give a handle back and wake one waiting acquirer.
    ///
    /// During the shutdown drain the handle is closed instead of re-pooled.
    ///
    /// # Errors
    ///
    /// `InvalidRelease` for a handle from another pool, a handle this pool
    /// does not consider borrowed, or a release after shutdown completed.
    /// The handle is closed in every error case; pool state is untouched.
    pub fn release(&self, mut handle: Handle<C>) -> CouponResult<()> {
        if handle.pool_id != self.id {
            warn!(slot = handle.slot, "handle released to a foreign pool");
            close_quietly(&mut handle);
            return Err(CouponError::InvalidRelease {
                handle: handle.slot,
                reason: "handle belongs to another pool",
            });
        }

        let mut state = self.state.lock();
        if !state.outstanding.remove(&handle.slot) {
            drop(state);
            warn!(slot = handle.slot, "handle released twice");
            close_quietly(&mut handle);
            return Err(CouponError::InvalidRelease {
                handle: handle.slot,
                reason: "handle is not checked out",
            });
        }

        match state.phase {
            PoolPhase::Open => {
                debug!(slot = handle.slot, "handle released");
                state.available.push(handle);
                drop(state);
                self.handle_available.notify_one();
                Ok(())
            }
            PoolPhase::Draining => {
                state.closed_handles += 1;
                drop(state);
                close_quietly(&mut handle);
                self.handle_returned.notify_all();
                Ok(())
            }
            PoolPhase::Closed => {
                state.closed_handles += 1;
                drop(state);
                warn!(slot = handle.slot, "handle returned after shutdown; closing it");
                close_quietly(&mut handle);
                Err(CouponError::InvalidRelease {
                    handle: handle.slot,
                    reason: "pool already shut down",
                })
            }
        }
    }

    /// Close the pool. Idempotent.
    ///
    /// Wakes every blocked acquirer with `PoolClosed`, closes idle handles,
    /// then waits up to `limits.drain_timeout` for borrowed handles.
    pub fn shutdown(&self) -> ShutdownReport {
        let idle = {
            let mut state = self.state.lock();
            if state.phase != PoolPhase::Open {
                return ShutdownReport::default();
            }
            state.phase = PoolPhase::Draining;
            let idle: Vec<Handle<C>> = state.available.drain(..).collect();
            state.closed_handles += idle.len();
            idle
        };
        self.handle_available.notify_all();

        let mut closed = idle.len();
        for mut handle in idle {
            close_quietly(&mut handle);
        }

        let deadline = Instant::now() + self.limits.drain_timeout;
        let mut state = self.state.lock();
        let draining_from = state.outstanding.len();
        while !state.outstanding.is_empty() {
            if self.handle_returned.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        closed += draining_from - state.outstanding.len();
        let leaked = state.outstanding.len();
        state.phase = PoolPhase::Closed;
        drop(state);

        if leaked > 0 {
            warn!(pool_id = %self.id, leaked, "handles still borrowed after drain window");
        }
        info!(pool_id = %self.id, closed, leaked, "connection pool closed");

        ShutdownReport {
            closed,
            leaked,
            first_call: true,
        }
    }

    /// Snapshot of current utilization.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.limits.capacity,
            available: state.available.len(),
            outstanding: state.outstanding.len(),
            peak_outstanding: state.peak_outstanding,
            closed_handles: state.closed_handles,
            phase: state.phase,
        }
    }

    /// True once shutdown has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().phase != PoolPhase::Open
    }
}

impl<C: Connection> Drop for ResourcePool<C> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.phase == PoolPhase::Open {
            debug!(pool_id = %self.id, "pool dropped without explicit shutdown");
            for handle in &mut state.available {
                close_quietly(handle);
            }
            state.phase = PoolPhase::Closed;
        }
    }
}

fn close_quietly<C: Connection>(handle: &mut Handle<C>) {
    if let Err(e) = handle.conn.close() {
        warn!(slot = handle.slot, error = %e, "failed to close connection");
    }
}

/// RAII borrow of a pool handle; released on drop on every exit path.
pub struct PooledConnection<'a, C: Connection> {
    pool: &'a ResourcePool<C>,
    handle: Option<Handle<C>>,
}

impl<C: Connection> PooledConnection<'_, C> {
    /// Slot number of the borrowed handle.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.handle.as_ref().map_or(usize::MAX, Handle::slot)
    }
}

impl<C: Connection> Deref for PooledConnection<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        // Present until drop.
        match self.handle.as_ref() {
            Some(handle) => &handle.conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: Connection> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        match self.handle.as_mut() {
            Some(handle) => &mut handle.conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: Connection> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.pool.release(handle) {
                warn!(error = %e, "pooled connection release rejected");
            }
        }
    }
}
