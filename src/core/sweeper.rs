//! Background removal of expired coupons.
//!
//! The sweeper runs on its own OS thread: one pass deletes every coupon whose
//! end date lies strictly before "now", then it sleeps for the configured
//! interval and repeats. The sleep waits on a `Condvar`, so a cancellation
//! wakes it immediately (no polling). Cancellation is also checked before
//! each coupon deletion; a deletion already in flight is finished first.
//!
//! Any sweep error ends the thread in `Failed` (fail-fast, no retry).

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::cascade::CascadeCoordinator;
use crate::core::error::{CouponError, CouponResult};
use crate::core::model::RecordId;
use crate::core::repository::CouponRepository;
use crate::util::clock::Clock;

/// Sweeper lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweeperPhase {
    /// Constructed, not yet started.
    Idle,
    /// Running a pass.
    Sweeping,
    /// Waiting for the next pass.
    Sleeping,
    /// Stopped on request. Terminal.
    Cancelled,
    /// Stopped on error. Terminal.
    Failed,
}

impl SweeperPhase {
    /// True for `Cancelled` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed)
    }
}

/// Observable sweeper state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperState {
    /// Current phase.
    pub phase: SweeperPhase,
    /// True while the sweeper thread is alive.
    pub running: bool,
    /// Set once cancellation was requested.
    pub cancel_requested: bool,
    /// Start of the most recent pass.
    pub last_sweep_start: Option<DateTime<Utc>>,
    /// Completed passes.
    pub passes: u64,
    /// Coupons removed across all passes.
    pub coupons_removed: u64,
    /// Error that stopped the sweeper, if any.
    pub last_error: Option<String>,
}

impl Default for SweeperState {
    fn default() -> Self {
        Self {
            phase: SweeperPhase::Idle,
            running: false,
            cancel_requested: false,
            last_sweep_start: None,
            passes: 0,
            coupons_removed: 0,
            last_error: None,
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Instant the pass compared end dates against.
    pub now: Option<DateTime<Utc>>,
    /// Coupons examined.
    pub scanned: usize,
    /// Ids of coupons removed.
    pub removed: Vec<RecordId>,
    /// True when cancellation cut the pass short.
    pub interrupted: bool,
}

struct Shared {
    state: Mutex<SweeperState>,
    wake: Condvar,
}

/// Cloneable handle for cancelling and observing a sweeper.
#[derive(Clone)]
pub struct SweeperControl {
    shared: Arc<Shared>,
}

impl SweeperControl {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SweeperState::default()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Request cancellation and wake the sweeper if it is sleeping.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        if !state.cancel_requested {
            debug!("expiration sweeper cancellation requested");
        }
        state.cancel_requested = true;
        drop(state);
        self.shared.wake.notify_all();
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.lock().cancel_requested
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SweeperState {
        self.shared.state.lock().clone()
    }

    /// Block until the sweeper reaches `phase` or a terminal phase, or `timeout` passes.
    ///
    /// Returns the phase observed last.
    pub fn wait_for_phase(&self, phase: SweeperPhase, timeout: Duration) -> SweeperPhase {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.phase != phase && !state.phase.is_terminal() {
            if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.phase
    }

    fn update(&self, f: impl FnOnce(&mut SweeperState)) {
        let mut state = self.shared.state.lock();
        f(&mut state);
        drop(state);
        self.shared.wake.notify_all();
    }

    /// Sleep until `deadline` or cancellation. Returns true if cancelled.
    fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.shared.state.lock();
        while !state.cancel_requested {
            if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.cancel_requested
    }
}

/// Periodic expired-coupon remover.
pub struct ExpirationSweeper {
    coupons: Arc<dyn CouponRepository>,
    coordinator: CascadeCoordinator,
    clock: Arc<dyn Clock>,
    interval: Duration,
    control: SweeperControl,
}

impl ExpirationSweeper {
    /// Create a sweeper that runs every `interval`.
    pub fn new(coordinator: CascadeCoordinator, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            coupons: Arc::clone(&coordinator.repositories().coupons),
            coordinator,
            clock,
            interval,
            control: SweeperControl::new(),
        }
    }

    /// Control handle for this sweeper.
    #[must_use]
    pub fn control(&self) -> SweeperControl {
        self.control.clone()
    }

    /// Run one pass now: remove every coupon with `end_date < clock.now()`.
    ///
    /// Stops early, between deletions, if cancellation was requested.
    ///
    /// # Errors
    ///
    /// The first store or cascade failure. Coupons that disappeared
    /// concurrently are skipped.
    pub fn sweep_pass(&self) -> CouponResult<SweepReport> {
        let now = self.clock.now();
        let coupons = self.coupons.get_all()?;
        let mut report = SweepReport {
            now: Some(now),
            scanned: coupons.len(),
            ..SweepReport::default()
        };

        for coupon in coupons.iter().filter(|c| c.is_expired_at(now)) {
            if self.control.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match self.coordinator.delete_coupon(coupon.id) {
                Ok(_) => {
                    debug!(coupon_id = coupon.id, end_date = %coupon.end_date, "expired coupon removed");
                    report.removed.push(coupon.id);
                }
                Err(e) if e.is_not_found() => {
                    debug!(coupon_id = coupon.id, "expired coupon already gone");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed.len(),
            interrupted = report.interrupted,
            "expiration sweep finished"
        );
        Ok(report)
    }

    /// Start the sweeper on a dedicated thread.
    ///
    /// # Errors
    ///
    /// `Internal` if the thread cannot be spawned.
    pub fn spawn(self) -> CouponResult<SweeperHandle> {
        let control = self.control();
        control.update(|s| s.running = true);
        let thread = thread::Builder::new()
            .name("coupon-expiry-sweeper".into())
            .spawn(move || self.run())
            .map_err(|e| {
                control.update(|s| s.running = false);
                CouponError::Internal(format!("failed to spawn expiration sweeper: {e}"))
            })?;

        info!("expiration sweeper started");
        Ok(SweeperHandle {
            control,
            thread: Some(thread),
        })
    }

    fn run(self) -> CouponResult<()> {
        loop {
            if self.control.is_cancelled() {
                break;
            }

            let started = self.clock.now();
            self.control.update(|s| {
                s.phase = SweeperPhase::Sweeping;
                s.last_sweep_start = Some(started);
            });

            match self.sweep_pass() {
                Ok(report) => self.control.update(|s| {
                    s.passes += 1;
                    s.coupons_removed += report.removed.len() as u64;
                }),
                Err(e) if e.is_pool_closed() && self.control.is_cancelled() => break,
                Err(e) => {
                    error!(error = %e, "expiration sweep failed; sweeper stopping");
                    let message = e.to_string();
                    self.control.update(|s| {
                        s.phase = SweeperPhase::Failed;
                        s.running = false;
                        s.last_error = Some(message);
                    });
                    return Err(e);
                }
            }

            self.control.update(|s| {
                if !s.cancel_requested {
                    s.phase = SweeperPhase::Sleeping;
                }
            });
            if self.control.sleep_until(Instant::now() + self.interval) {
                break;
            }
        }

        self.control.update(|s| {
            s.phase = SweeperPhase::Cancelled;
            s.running = false;
        });
        info!("expiration sweeper cancelled");
        Ok(())
    }
}

/// Owner of a running sweeper thread.
pub struct SweeperHandle {
    control: SweeperControl,
    thread: Option<JoinHandle<CouponResult<()>>>,
}

impl SweeperHandle {
    /// Control handle for the running sweeper.
    #[must_use]
    pub fn control(&self) -> SweeperControl {
        self.control.clone()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SweeperState {
        self.control.state()
    }

    /// Wait up to `timeout` for the thread to exit.
    ///
    /// Joins on a helper thread so the wait is bounded. Later calls do not
    /// wait again; they report the final state, or `ShutdownTimeout` while a
    /// detached thread is still alive.
    ///
    /// # Errors
    ///
    /// `ShutdownTimeout` if the thread is still running after `timeout` (it
    /// is left detached), `Internal` if it panicked. A sweeper that stopped
    /// on its own error reports that error here.
    pub fn join_timeout(&mut self, timeout: Duration) -> CouponResult<SweeperState> {
        let Some(thread) = self.thread.take() else {
            let state = self.control.state();
            if state.running {
                return Err(CouponError::ShutdownTimeout(timeout));
            }
            return Ok(state);
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let joiner = thread::Builder::new()
            .name("coupon-expiry-sweeper-join".into())
            .spawn(move || {
                let _ = tx.send(thread.join());
            })
            .map_err(|e| CouponError::Internal(format!("failed to spawn join helper: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(outcome)) => {
                let _ = joiner.join();
                outcome.map(|()| self.control.state())
            }
            Ok(Err(_)) => {
                let _ = joiner.join();
                self.control.update(|s| {
                    s.phase = SweeperPhase::Failed;
                    s.running = false;
                    s.last_error = Some("sweeper thread panicked".into());
                });
                Err(CouponError::Internal("expiration sweeper panicked".into()))
            }
            Err(_) => {
                warn!(?timeout, "expiration sweeper did not stop in time; detaching");
                Err(CouponError::ShutdownTimeout(timeout))
            }
        }
    }
}
