//! Builders to construct resource pools from configuration.

use tracing::{debug, error};

use crate::config::PoolConfig;
use crate::core::{Connection, CouponError, CouponResult, ResourcePool};

/// Open `cfg.capacity` connections with `connect` and pool them.
///
/// `connect` receives the slot number being opened. If any connection fails
/// to open, the ones already opened are closed and the error is returned.
///
/// # Errors
///
/// `InvalidConfig` when `cfg` fails validation, or the first connect failure.
pub fn build_pool<C, F>(cfg: &PoolConfig, mut connect: F) -> CouponResult<ResourcePool<C>>
where
    C: Connection,
    F: FnMut(usize) -> CouponResult<C>,
{
    cfg.validate().map_err(CouponError::InvalidConfig)?;

    let mut connections = Vec::with_capacity(cfg.capacity);
    for slot in 0..cfg.capacity {
        match connect(slot) {
            Ok(conn) => {
                debug!(slot, "connection opened");
                connections.push(conn);
            }
            Err(e) => {
                error!(slot, error = %e, "failed to open pool connection");
                for mut conn in connections {
                    let _ = conn.close();
                }
                return Err(e);
            }
        }
    }

    ResourcePool::new(cfg.limits(), connections)
}
