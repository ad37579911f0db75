//! Fixed-order multi-record deletion.
//!
//! The store has no multi-statement transactions, so owner deletions run as a
//! sequence of single-repository calls in an order that never leaves a cross
//! reference pointing at a deleted coupon. A failed step stops the sequence;
//! completed steps stay done. Every step is idempotent, so re-running a failed
//! delete is the recovery path. A coupon whose row delete failed after its
//! references were removed is left unreferenced; [`CascadeCoordinator::delete_coupon`]
//! (or the expiration sweeper) removes it.

use std::fmt;

use tracing::{debug, info, warn};

use crate::core::error::{CouponError, CouponResult, EntityKind};
use crate::core::model::{Company, Customer, Entity, RecordId};
use crate::core::repository::Repositories;

/// One step of a cascade delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    /// Reading the owner's coupon references.
    ListCoupons,
    /// Removing the company reference of a coupon.
    UnlinkCompanyCoupon(RecordId),
    /// Removing customer references of a coupon.
    UnlinkCustomerCoupon(RecordId),
    /// Removing one customer/coupon pair.
    UnlinkCustomerPair(RecordId),
    /// Removing a coupon row.
    RemoveCoupon(RecordId),
    /// Removing the company row.
    RemoveCompany,
    /// Removing the customer row.
    RemoveCustomer,
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListCoupons => write!(f, "list coupons"),
            Self::UnlinkCompanyCoupon(id) => write!(f, "unlink company from coupon {id}"),
            Self::UnlinkCustomerCoupon(id) => write!(f, "unlink customers from coupon {id}"),
            Self::UnlinkCustomerPair(id) => write!(f, "unlink customer from coupon {id}"),
            Self::RemoveCoupon(id) => write!(f, "remove coupon {id}"),
            Self::RemoveCompany => write!(f, "remove company"),
            Self::RemoveCustomer => write!(f, "remove customer"),
        }
    }
}

/// What a cascade delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Coupon rows removed.
    pub coupons_removed: usize,
    /// Cross-reference rows removed.
    pub links_removed: usize,
}

/// Runs cascade deletes over a set of repositories.
#[derive(Clone)]
pub struct CascadeCoordinator {
    repos: Repositories,
}

impl CascadeCoordinator {
    /// Create a coordinator over `repos`.
    pub const fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Repositories this coordinator writes through.
    #[must_use]
    pub const fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Delete a company, every coupon it issued, and all references to them.
    ///
    /// # Errors
    ///
    /// `NotFound` when the company does not exist; `Cascade` naming the
    /// failed step otherwise.
    pub fn delete_company(&self, company_id: RecordId) -> CouponResult<CascadeReport> {
        let owner = (Company::KIND, company_id);
        self.repos.companies.get_by_id(company_id)?;

        let coupon_ids = step(owner, CascadeStep::ListCoupons, || {
            self.repos.links.company_coupons(company_id)
        })?;

        let mut report = CascadeReport::default();
        for coupon_id in coupon_ids {
            self.unlink_coupon(owner, coupon_id, &mut report)?;
            let removed = step(owner, CascadeStep::RemoveCoupon(coupon_id), || {
                tolerate_missing(self.repos.coupons.remove(coupon_id).map(|()| 1))
            })?;
            report.coupons_removed += removed;
        }

        step(owner, CascadeStep::RemoveCompany, || {
            self.repos.companies.remove(company_id)
        })?;

        info!(
            company_id,
            coupons_removed = report.coupons_removed,
            links_removed = report.links_removed,
            "company deleted"
        );
        Ok(report)
    }

    /// Delete a customer and its coupon references. Coupons themselves stay.
    ///
    /// # Errors
    ///
    /// `NotFound` when the customer does not exist; `Cascade` naming the
    /// failed step otherwise.
    pub fn delete_customer(&self, customer_id: RecordId) -> CouponResult<CascadeReport> {
        let owner = (Customer::KIND, customer_id);
        self.repos.customers.get_by_id(customer_id)?;

        let coupon_ids = step(owner, CascadeStep::ListCoupons, || {
            self.repos.links.customer_coupons(customer_id)
        })?;

        let mut report = CascadeReport::default();
        for coupon_id in coupon_ids {
            report.links_removed += step(owner, CascadeStep::UnlinkCustomerPair(coupon_id), || {
                tolerate_missing(
                    self.repos
                        .links
                        .unlink_customer_pair(customer_id, coupon_id)
                        .map(|()| 1),
                )
            })?;
        }

        step(owner, CascadeStep::RemoveCustomer, || {
            self.repos.customers.remove(customer_id)
        })?;

        info!(customer_id, links_removed = report.links_removed, "customer deleted");
        Ok(report)
    }

    /// Delete a coupon and every reference to it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the coupon row is already gone (its references are
    /// still cleaned up first); `Cascade` naming the failed step otherwise.
    pub fn delete_coupon(&self, coupon_id: RecordId) -> CouponResult<CascadeReport> {
        let owner = (EntityKind::Coupon, coupon_id);
        let mut report = CascadeReport::default();
        self.unlink_coupon(owner, coupon_id, &mut report)?;

        match self.repos.coupons.remove(coupon_id) {
            Ok(()) => report.coupons_removed += 1,
            Err(e) if e.is_not_found() => return Err(e),
            Err(e) => return Err(cascade_error(owner, CascadeStep::RemoveCoupon(coupon_id), e)),
        }

        debug!(coupon_id, links_removed = report.links_removed, "coupon deleted");
        Ok(report)
    }

    fn unlink_coupon(
        &self,
        owner: (EntityKind, RecordId),
        coupon_id: RecordId,
        report: &mut CascadeReport,
    ) -> CouponResult<()> {
        report.links_removed += step(owner, CascadeStep::UnlinkCompanyCoupon(coupon_id), || {
            tolerate_missing(self.repos.links.unlink_company_coupon(coupon_id))
        })?;
        report.links_removed += step(owner, CascadeStep::UnlinkCustomerCoupon(coupon_id), || {
            tolerate_missing(self.repos.links.unlink_customer_coupon(coupon_id))
        })?;
        Ok(())
    }
}

/// Absent rows count as already deleted.
fn tolerate_missing(result: CouponResult<usize>) -> CouponResult<usize> {
    match result {
        Err(e) if e.is_not_found() => Ok(0),
        other => other,
    }
}

fn step<T>(
    owner: (EntityKind, RecordId),
    step: CascadeStep,
    run: impl FnOnce() -> CouponResult<T>,
) -> CouponResult<T> {
    run().map_err(|e| cascade_error(owner, step, e))
}

fn cascade_error(owner: (EntityKind, RecordId), step: CascadeStep, source: CouponError) -> CouponError {
    warn!(
        owner = %owner.0,
        owner_id = owner.1,
        %step,
        error = %source,
        "cascade delete stopped; completed steps are kept"
    );
    CouponError::Cascade {
        owner: owner.0,
        owner_id: owner.1,
        step,
        source: Box::new(source),
    }
}
