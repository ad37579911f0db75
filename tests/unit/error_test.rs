//! Tests for error types

use coupon_system::core::{CascadeStep, ClientType, CouponError, EntityKind, Operation};
use std::error::Error;
use std::time::Duration;

#[test]
fn test_not_found_error() {
    let err = CouponError::NotFound {
        kind: EntityKind::Coupon,
        id: 42,
    };
    assert_eq!(format!("{err}"), "coupon 42 not found");
    assert!(err.is_not_found());
}

#[test]
fn test_store_error() {
    let err = CouponError::store(Operation::Remove, EntityKind::CustomerCoupon, "disk full");
    assert_eq!(format!("{err}"), "remove customer coupon failed: disk full");
    assert!(!err.is_not_found());
}

#[test]
fn test_cascade_error_keeps_source() {
    let err = CouponError::Cascade {
        owner: EntityKind::Company,
        owner_id: 3,
        step: CascadeStep::RemoveCoupon(30),
        source: Box::new(CouponError::store(Operation::Remove, EntityKind::Coupon, "io")),
    };
    assert_eq!(
        format!("{err}"),
        "cascade delete of company 3 failed at remove coupon 30: remove coupon failed: io"
    );
    assert!(err.source().is_some());
    assert!(!err.is_pool_closed());
}

#[test]
fn test_pool_closed_seen_through_cascade() {
    assert!(CouponError::PoolClosed.is_pool_closed());
    let err = CouponError::Cascade {
        owner: EntityKind::Coupon,
        owner_id: 1,
        step: CascadeStep::UnlinkCompanyCoupon(1),
        source: Box::new(CouponError::PoolClosed),
    };
    assert!(err.is_pool_closed());
    assert!(!err.is_not_found());
    assert!(!CouponError::AcquireTimeout(Duration::from_millis(5)).is_pool_closed());
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(format!("{}", CouponError::PoolClosed), "connection pool is closed");
    assert_eq!(
        format!("{}", CouponError::AuthFailed(ClientType::Customer)),
        "login failed for customer"
    );
    assert_eq!(
        format!("{}", CouponError::ShutdownTimeout(Duration::from_secs(2))),
        "expiration sweeper did not stop within 2s"
    );
}
