//! Tests for configuration validation

use coupon_system::config::{PoolConfig, SweeperConfig, SystemConfig};
use std::time::Duration;

#[test]
fn test_defaults_are_valid() {
    let cfg = SystemConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.pool.capacity, 10);
    assert_eq!(cfg.sweeper.interval(), Duration::from_secs(86_400));
    assert_eq!(cfg.admin.username, "admin");
    assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(30));
}

#[test]
fn test_pool_config_invalid_capacity() {
    let invalid = PoolConfig {
        capacity: 0,
        ..PoolConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_acquire_timeout() {
    let invalid = PoolConfig {
        acquire_timeout_ms: Some(0),
        ..PoolConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_limits_conversion() {
    let cfg = PoolConfig {
        capacity: 3,
        acquire_timeout_ms: Some(250),
        drain_timeout_ms: 1_000,
    };
    let limits = cfg.limits();
    assert_eq!(limits.capacity, 3);
    assert_eq!(limits.acquire_timeout, Some(Duration::from_millis(250)));
    assert_eq!(limits.drain_timeout, Duration::from_secs(1));
}

#[test]
fn test_sweeper_config_invalid_interval() {
    let invalid = SweeperConfig {
        enabled: true,
        interval_secs: 0,
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_system_config_from_json_partial() {
    let cfg = SystemConfig::from_json_str(r#"{"pool": {"capacity": 4}, "sweeper": {"enabled": false}}"#)
        .unwrap();
    assert_eq!(cfg.pool.capacity, 4);
    assert_eq!(cfg.pool.drain_timeout_ms, 5_000);
    assert!(!cfg.sweeper.enabled);
    assert_eq!(cfg.shutdown_timeout_secs, 30);
}

#[test]
fn test_system_config_from_json_rejects_invalid() {
    let err = SystemConfig::from_json_str(r#"{"shutdown_timeout_secs": 0}"#).unwrap_err();
    assert!(err.contains("shutdown_timeout_secs"));
    assert!(SystemConfig::from_json_str("not json").is_err());
    let err = SystemConfig::from_json_str(r#"{"pool": {"capacity": 0}}"#).unwrap_err();
    assert!(err.starts_with("pool:"));
}
