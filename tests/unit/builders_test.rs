//! Tests for builder modules

use coupon_system::builders::build_pool;
use coupon_system::config::PoolConfig;
use coupon_system::core::{CouponError, PoolPhase, StoreBackend};
use coupon_system::infra::MemoryStore;

#[test]
fn test_build_pool_opens_capacity_connections() {
    let store = MemoryStore::new();
    let cfg = PoolConfig {
        capacity: 5,
        ..PoolConfig::default()
    };
    let pool = build_pool(&cfg, |_| store.connect()).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.capacity, 5);
    assert_eq!(stats.available, 5);
    assert_eq!(stats.phase, PoolPhase::Open);
    assert_eq!(store.open_connections(), 5);
}

#[test]
fn test_build_pool_rejects_invalid_config() {
    let store = MemoryStore::new();
    let cfg = PoolConfig {
        capacity: 0,
        ..PoolConfig::default()
    };
    let result = build_pool(&cfg, |_| store.connect());
    assert!(matches!(result, Err(CouponError::InvalidConfig(_))));
    assert_eq!(store.connections_opened(), 0);
}

#[test]
fn test_build_pool_passes_slot_numbers() {
    let store = MemoryStore::new();
    let mut seen = Vec::new();
    let cfg = PoolConfig {
        capacity: 3,
        ..PoolConfig::default()
    };
    build_pool(&cfg, |slot| {
        seen.push(slot);
        store.connect()
    })
    .unwrap();
    assert_eq!(seen, vec![0, 1, 2]);
}
