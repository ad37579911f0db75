//! # Coupon System
//!
//! Coupon issuance and purchasing over a bounded pool of store connections.
//!
//! Companies issue coupons, customers buy them, and an administrator manages
//! both. Everything runs on OS threads with `parking_lot` synchronization:
//!
//! - **`ResourcePool`**: fixed number of store connections; borrowers block
//!   until one is free. Shutdown is terminal and wakes every waiter.
//! - **Repositories**: CRUD contracts per record family, each call borrowing
//!   exactly one connection for its own duration.
//! - **`CascadeCoordinator`**: deletes companies, customers, and coupons in a
//!   fixed order that never leaves a reference to a deleted coupon.
//! - **`ExpirationSweeper`**: background thread removing expired coupons on
//!   an interval, cancellable at any point.
//! - **`CouponSystem`**: owns all of the above, hands out facades on login,
//!   and shuts down in order (sweeper first, then pool).
//!
//! ```rust,ignore
//! use coupon_system::config::SystemConfig;
//! use coupon_system::core::{ClientType, Company, CouponSystem};
//! use coupon_system::infra::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let system = CouponSystem::start(SystemConfig::default(), &store)?;
//!
//! let admin = system
//!     .login(ClientType::Admin, "admin", "1234")?
//!     .into_admin()
//!     .expect("admin session");
//! admin.create_company(&Company::new(1, "acme", "secret", "ops@acme.test"))?;
//!
//! system.shutdown()?;
//! ```
//!
//! With the default `tokio-runtime` feature, [`runtime`] offers async
//! wrappers that move blocking pool waits onto tokio's blocking pool.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct pools from configuration.
pub mod builders;
/// Configuration models for the pool, sweeper, and admin login.
pub mod config;
/// Pool, repositories, cascade, sweeper, and lifecycle.
pub mod core;
/// Client facades handed out on login.
pub mod facade;
/// Store backends.
pub mod infra;
/// Async runtime adapters.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
