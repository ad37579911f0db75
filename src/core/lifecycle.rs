//! System lifecycle: start, login, shutdown.
//!
//! [`CouponSystem`] owns every long-lived component. It is created once by
//! the embedding program and passed by reference; there is no global.
//! Shutdown order is fixed: cancel the sweeper, wait for it (bounded), then
//! close the pool.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::builders::build_pool;
use crate::config::SystemConfig;
use crate::core::cascade::CascadeCoordinator;
use crate::core::error::{CouponError, CouponResult};
use crate::core::model::{ClientType, Credentialed};
use crate::core::repository::{Repositories, Repository, StoreBackend};
use crate::core::resource_pool::{PoolStats, ResourcePool, ShutdownReport};
use crate::core::sweeper::{ExpirationSweeper, SweeperControl, SweeperHandle, SweeperState};
use crate::facade::{AdminFacade, CompanyFacade, CustomerFacade, Session};
use crate::util::clock::{Clock, SystemClock};

/// A running coupon system.
pub struct CouponSystem<B: StoreBackend> {
    config: SystemConfig,
    pool: Arc<ResourcePool<B::Conn>>,
    repos: Repositories,
    coordinator: CascadeCoordinator,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<SweeperHandle>>,
    sweeper_control: Option<SweeperControl>,
}

impl<B: StoreBackend> CouponSystem<B> {
    /// Start the system on the wall clock.
    ///
    /// # Errors
    ///
    /// See [`start_with_clock`](Self::start_with_clock).
    pub fn start(config: SystemConfig, backend: &B) -> CouponResult<Self> {
        Self::start_with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Validate `config`, open the pool, and start the sweeper if enabled.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, the backend's connect failure, or `Internal` when the
    /// sweeper thread cannot be spawned. Nothing is left running on error.
    pub fn start_with_clock(
        config: SystemConfig,
        backend: &B,
        clock: Arc<dyn Clock>,
    ) -> CouponResult<Self> {
        config.validate().map_err(CouponError::InvalidConfig)?;

        let pool = Arc::new(build_pool(&config.pool, |_| backend.connect())?);
        let repos = backend.repositories(&pool);
        let coordinator = CascadeCoordinator::new(repos.clone());

        let sweeper = if config.sweeper.enabled {
            let sweeper = ExpirationSweeper::new(
                coordinator.clone(),
                Arc::clone(&clock),
                config.sweeper.interval(),
            );
            match sweeper.spawn() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(error = %e, "expiration sweeper failed to start");
                    pool.shutdown();
                    return Err(e);
                }
            }
        } else {
            None
        };
        let sweeper_control = sweeper.as_ref().map(SweeperHandle::control);

        info!(
            pool_capacity = config.pool.capacity,
            sweeper_enabled = config.sweeper.enabled,
            sweep_interval_secs = config.sweeper.interval_secs,
            "coupon system started"
        );

        Ok(Self {
            config,
            pool,
            repos,
            coordinator,
            clock,
            sweeper: Mutex::new(sweeper),
            sweeper_control,
        })
    }

    /// Check credentials and hand out the facade for `kind`.
    ///
    /// # Errors
    ///
    /// `AuthFailed(kind)` for unknown credentials, `PoolClosed` after
    /// shutdown, `Store` on store failure.
    pub fn login(&self, kind: ClientType, name: &str, password: &str) -> CouponResult<Session> {
        if self.pool.is_closed() {
            return Err(CouponError::PoolClosed);
        }

        let session = match kind {
            ClientType::Admin => {
                let admin = &self.config.admin;
                (admin.username == name && admin.password == password)
                    .then(|| Session::Admin(AdminFacade::new(self.coordinator.clone())))
            }
            ClientType::Company => find_by_credentials(&*self.repos.companies, name, password)?
                .map(|company| {
                    Session::Company(CompanyFacade::new(company.id, self.coordinator.clone()))
                }),
            ClientType::Customer => find_by_credentials(&*self.repos.customers, name, password)?
                .map(|customer| {
                    Session::Customer(CustomerFacade::new(
                        customer.id,
                        self.repos.clone(),
                        Arc::clone(&self.clock),
                    ))
                }),
        };

        match session {
            Some(session) => {
                debug!(client_type = %kind, name, "login accepted");
                Ok(session)
            }
            None => {
                info!(client_type = %kind, name, "login rejected");
                Err(CouponError::AuthFailed(kind))
            }
        }
    }

    /// Stop the sweeper and close the pool. Idempotent.
    ///
    /// The pool is closed even when the sweeper does not stop in time.
    ///
    /// # Errors
    ///
    /// `ShutdownTimeout` when the sweeper is still running after
    /// `shutdown_timeout`. An error the sweeper stopped with earlier is
    /// logged, not returned. Only the first call waits for the sweeper;
    /// later calls return the pool's report with `first_call: false`.
    pub fn shutdown(&self) -> CouponResult<ShutdownReport> {
        let mut sweeper = self.sweeper.lock();
        let mut timed_out = None;

        // Taken on the first call; a sweeper that timed out stays detached.
        if let Some(mut handle) = sweeper.take() {
            handle.cancel();
            match handle.join_timeout(self.config.shutdown_timeout()) {
                Ok(state) => debug!(phase = ?state.phase, passes = state.passes, "sweeper stopped"),
                Err(CouponError::ShutdownTimeout(timeout)) => {
                    error!(?timeout, "expiration sweeper did not stop; closing pool anyway");
                    timed_out = Some(timeout);
                }
                Err(e) => warn!(error = %e, "expiration sweeper had stopped with an error"),
            }
        }

        let report = self.pool.shutdown();
        drop(sweeper);

        if report.first_call {
            info!(closed = report.closed, leaked = report.leaked, "coupon system shut down");
        }
        match timed_out {
            Some(timeout) => Err(CouponError::ShutdownTimeout(timeout)),
            None => Ok(report),
        }
    }

    /// Pool utilization.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Sweeper state, or `None` when the sweeper is disabled.
    #[must_use]
    pub fn sweeper_state(&self) -> Option<SweeperState> {
        self.sweeper_control.as_ref().map(SweeperControl::state)
    }

    /// Control handle of the sweeper, or `None` when it is disabled.
    #[must_use]
    pub fn sweeper_control(&self) -> Option<SweeperControl> {
        self.sweeper_control.clone()
    }

    /// Repositories over the system pool.
    #[must_use]
    pub const fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Cascade coordinator over the system repositories.
    #[must_use]
    pub const fn coordinator(&self) -> &CascadeCoordinator {
        &self.coordinator
    }

    /// Configuration the system was started with.
    #[must_use]
    pub const fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The connection pool.
    #[must_use]
    pub fn pool(&self) -> Arc<ResourcePool<B::Conn>> {
        Arc::clone(&self.pool)
    }
}

impl<B: StoreBackend> Drop for CouponSystem<B> {
    fn drop(&mut self) {
        if let Some(control) = &self.sweeper_control {
            control.cancel();
        }
        if !self.pool.is_closed() {
            debug!("coupon system dropped without shutdown");
        }
    }
}

fn find_by_credentials<E: Credentialed>(
    repo: &dyn Repository<E>,
    name: &str,
    password: &str,
) -> CouponResult<Option<E>> {
    let matches = repo.get_by_predicate(&|row: &E| row.matches(name, password))?;
    Ok(matches.into_iter().next())
}
