//! Core coupon-system components: pool, repositories, cascade, sweeper, lifecycle.

pub mod cascade;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod repository;
pub mod resource_pool;
pub mod sweeper;

pub use cascade::{CascadeCoordinator, CascadeReport, CascadeStep};
pub use error::{AppResult, CouponError, CouponResult, EntityKind, Operation};
pub use lifecycle::CouponSystem;
pub use model::{
    ClientType, Company, Coupon, CouponType, Credentialed, Customer, Entity, RecordId,
};
pub use repository::{
    CouponRepository, LinkRepository, Predicate, Repositories, Repository, StoreBackend,
};
pub use resource_pool::{
    Connection, Handle, PoolLimits, PoolPhase, PoolStats, PooledConnection, ResourcePool,
    ShutdownReport,
};
pub use sweeper::{
    ExpirationSweeper, SweepReport, SweeperControl, SweeperHandle, SweeperPhase, SweeperState,
};
