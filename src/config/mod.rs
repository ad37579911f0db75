//! Configuration models for the pool, sweeper, and lifecycle.

pub mod system;

pub use system::{AdminConfig, PoolConfig, SweeperConfig, SystemConfig};
