//! Integration tests for cascade deletes
//!
//! Covers ordering (no reference outlives its coupon), idempotent
//! cross-reference cleanup, and partial failure followed by a re-run.

use chrono::{Duration as Days, Utc};
use coupon_system::builders::build_pool;
use coupon_system::config::PoolConfig;
use coupon_system::core::{
    CascadeCoordinator, CascadeStep, Company, Coupon, CouponError, CouponType, Customer,
    EntityKind, Operation, Repositories, StoreBackend,
};
use coupon_system::infra::MemoryStore;
use std::sync::Arc;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Fixture {
    store: MemoryStore,
    repos: Repositories,
    coordinator: CascadeCoordinator,
}

fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let pool = Arc::new(build_pool(&PoolConfig::default(), |_| store.connect()).unwrap());
    let repos = store.repositories(&pool);
    let coordinator = CascadeCoordinator::new(repos.clone());
    Fixture {
        store,
        repos,
        coordinator,
    }
}

fn coupon(id: u64) -> Coupon {
    let now = Utc::now();
    Coupon::new(id, format!("coupon-{id}"), CouponType::Travelling, now, now + Days::days(30))
        .with_amount(10)
}

/// Company `company_id` issuing `count` coupons, each bought by customers 1 and 2.
fn seed(f: &Fixture, company_id: u64, count: u64) -> Vec<u64> {
    f.repos
        .companies
        .create(&Company::new(company_id, format!("company-{company_id}"), "pw", "c@x.test"))
        .unwrap();
    for customer_id in [1, 2] {
        if f.repos.customers.get_by_id(customer_id).is_err() {
            f.repos
                .customers
                .create(&Customer::new(customer_id, format!("customer-{customer_id}"), "pw"))
                .unwrap();
        }
    }
    (0..count)
        .map(|n| {
            let id = company_id * 100 + n;
            f.repos.coupons.create(&coupon(id)).unwrap();
            f.repos.links.link_company(company_id, id).unwrap();
            f.repos.links.link_customer(1, id).unwrap();
            f.repos.links.link_customer(2, id).unwrap();
            id
        })
        .collect()
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_delete_company_removes_coupons_and_references() {
    for count in [0_u64, 1, 3] {
        let f = fixture();
        let ids = seed(&f, 7, count);

        let report = f.coordinator.delete_company(7).unwrap();
        assert_eq!(report.coupons_removed as u64, count);
        assert_eq!(report.links_removed as u64, count * 3);

        assert!(f.repos.companies.get_by_id(7).unwrap_err().is_not_found());
        for id in ids {
            assert!(f.repos.coupons.get_by_id(id).unwrap_err().is_not_found());
        }
        assert_eq!(f.store.link_counts(), (0, 0));
        assert_eq!(f.repos.customers.get_all().unwrap().len(), 2);
    }
}

#[test]
fn test_delete_company_leaves_other_companies_alone() {
    let f = fixture();
    seed(&f, 1, 2);
    let kept = seed(&f, 2, 2);

    f.coordinator.delete_company(1).unwrap();
    assert_eq!(f.repos.links.company_coupons(2).unwrap(), kept);
    assert_eq!(f.repos.links.customer_coupons(1).unwrap(), kept);
    assert_eq!(f.repos.coupons.get_all().unwrap().len(), 2);
}

#[test]
fn test_delete_missing_company_is_not_found() {
    let f = fixture();
    let err = f.coordinator.delete_company(99).unwrap_err();
    assert!(matches!(
        err,
        CouponError::NotFound {
            kind: EntityKind::Company,
            id: 99
        }
    ));
}

#[test]
fn test_delete_customer_keeps_coupons_and_other_purchases() {
    let f = fixture();
    let ids = seed(&f, 3, 2);

    let report = f.coordinator.delete_customer(1).unwrap();
    assert_eq!(report.links_removed, 2);
    assert_eq!(report.coupons_removed, 0);
    assert!(f.repos.customers.get_by_id(1).unwrap_err().is_not_found());
    assert_eq!(f.repos.links.customer_coupons(2).unwrap(), ids);
    assert_eq!(f.repos.coupons.get_all().unwrap().len(), 2);
}

// ============================================================================
// IDEMPOTENCE
// ============================================================================

#[test]
fn test_delete_coupon_twice() {
    let f = fixture();
    let ids = seed(&f, 4, 2);

    let report = f.coordinator.delete_coupon(ids[0]).unwrap();
    assert_eq!(report.coupons_removed, 1);
    assert_eq!(report.links_removed, 3);
    let links_after_first = f.store.link_counts();

    let err = f.coordinator.delete_coupon(ids[0]).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(f.store.link_counts(), links_after_first);
    assert_eq!(f.repos.links.company_coupons(4).unwrap(), vec![ids[1]]);
}

#[test]
fn test_delete_coupon_without_references() {
    let f = fixture();
    f.repos.coupons.create(&coupon(500)).unwrap();
    let report = f.coordinator.delete_coupon(500).unwrap();
    assert_eq!(report.links_removed, 0);
    assert_eq!(report.coupons_removed, 1);
}

// ============================================================================
// PARTIAL FAILURE
// ============================================================================

#[test]
fn test_failed_step_is_reported_and_rerun_completes() {
    let f = fixture();
    let ids = seed(&f, 5, 2);

    f.store.fail_on(Operation::Remove, EntityKind::Coupon);
    let err = f.coordinator.delete_company(5).unwrap_err();
    match err {
        CouponError::Cascade {
            owner,
            owner_id,
            step,
            source,
        } => {
            assert_eq!(owner, EntityKind::Company);
            assert_eq!(owner_id, 5);
            assert_eq!(step, CascadeStep::RemoveCoupon(ids[0]));
            assert!(matches!(*source, CouponError::Store { .. }));
        }
        other => panic!("expected cascade error, got {other:?}"),
    }

    // Completed steps stay done; nothing after the failed step ran.
    assert!(f.repos.companies.get_by_id(5).is_ok());
    assert_eq!(f.repos.links.company_coupons(5).unwrap(), vec![ids[1]]);
    assert!(f.repos.coupons.get_by_id(ids[0]).is_ok());

    f.store.heal();
    let report = f.coordinator.delete_company(5).unwrap();
    assert_eq!(report.coupons_removed, 1);
    assert_eq!(f.store.link_counts(), (0, 0));

    // The coupon whose row delete failed is unreferenced; deleting it directly finishes the job.
    let report = f.coordinator.delete_coupon(ids[0]).unwrap();
    assert_eq!(report.links_removed, 0);
    assert!(f.repos.coupons.get_all().unwrap().is_empty());
}

#[test]
fn test_listing_failure_names_step() {
    let f = fixture();
    seed(&f, 6, 1);
    f.store.fail_on(Operation::Query, EntityKind::CustomerCoupon);
    let err = f.coordinator.delete_customer(1).unwrap_err();
    assert!(matches!(
        err,
        CouponError::Cascade {
            step: CascadeStep::ListCoupons,
            ..
        }
    ));
    assert!(f.repos.customers.get_by_id(1).is_ok());
}
