//! Operations of a logged-in company on its own coupons.

use tracing::{info, warn};

use crate::core::cascade::{CascadeCoordinator, CascadeReport};
use crate::core::error::{CouponError, CouponResult, EntityKind};
use crate::core::model::{Company, Coupon, CouponType, RecordId};
use crate::core::repository::Repositories;

use super::{of_type, up_to_price};

/// Operations available to one company.
#[derive(Clone)]
pub struct CompanyFacade {
    company_id: RecordId,
    coordinator: CascadeCoordinator,
}

impl CompanyFacade {
    /// Create a facade scoped to `company_id`.
    pub const fn new(company_id: RecordId, coordinator: CascadeCoordinator) -> Self {
        Self {
            company_id,
            coordinator,
        }
    }

    /// Id of the company this facade acts for.
    #[must_use]
    pub const fn company_id(&self) -> RecordId {
        self.company_id
    }

    fn repos(&self) -> &Repositories {
        self.coordinator.repositories()
    }

    /// The company's own record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the company was deleted since login, `Store` on store failure.
    pub fn company(&self) -> CouponResult<Company> {
        self.repos().companies.get_by_id(self.company_id)
    }

    /// Issue a new coupon. Titles are unique across all companies.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` for a taken title or id, `Store` on store failure.
    pub fn create_coupon(&self, coupon: &Coupon) -> CouponResult<()> {
        let title = coupon.title.as_str();
        let taken = self
            .repos()
            .coupons
            .get_by_predicate(&|c: &Coupon| c.title == title)?;
        if !taken.is_empty() {
            return Err(CouponError::AlreadyExists {
                kind: EntityKind::Coupon,
                key: coupon.title.clone(),
            });
        }

        self.repos().coupons.create(coupon)?;
        if let Err(e) = self.repos().links.link_company(self.company_id, coupon.id) {
            warn!(
                company_id = self.company_id,
                coupon_id = coupon.id,
                error = %e,
                "linking new coupon failed; removing it"
            );
            if let Err(undo) = self.repos().coupons.remove(coupon.id) {
                warn!(coupon_id = coupon.id, error = %undo, "orphan coupon left behind");
            }
            return Err(e);
        }

        info!(company_id = self.company_id, coupon_id = coupon.id, title, "coupon created");
        Ok(())
    }

    /// Delete one of this company's coupons, including customer purchases of it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the coupon is not this company's, `Cascade` on partial failure.
    pub fn remove_coupon(&self, coupon_id: RecordId) -> CouponResult<CascadeReport> {
        self.ensure_owned(coupon_id)?;
        self.coordinator.delete_coupon(coupon_id)
    }

    /// Change the end date and price of one of this company's coupons.
    ///
    /// Other fields of `coupon` are ignored.
    ///
    /// # Errors
    ///
    /// `NotFound` when the coupon is not this company's, `Store` on store failure.
    pub fn update_coupon(&self, coupon: &Coupon) -> CouponResult<()> {
        self.ensure_owned(coupon.id)?;
        let mut stored = self.repos().coupons.get_by_id(coupon.id)?;
        stored.end_date = coupon.end_date;
        stored.price = coupon.price;
        self.repos().coupons.update(&stored)
    }

    /// Fetch one of this company's coupons.
    ///
    /// # Errors
    ///
    /// `NotFound` when the coupon is not this company's, `Store` on store failure.
    pub fn coupon(&self, coupon_id: RecordId) -> CouponResult<Coupon> {
        self.ensure_owned(coupon_id)?;
        self.repos().coupons.get_by_id(coupon_id)
    }

    /// Every coupon this company issued.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons(&self) -> CouponResult<Vec<Coupon>> {
        let ids = self.repos().links.company_coupons(self.company_id)?;
        self.repos().coupons_by_ids(&ids)
    }

    /// This company's coupons of one category.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons_by_type(&self, kind: CouponType) -> CouponResult<Vec<Coupon>> {
        Ok(of_type(self.coupons()?, kind))
    }

    /// This company's coupons priced at or below `max_price`.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons_up_to_price(&self, max_price: f64) -> CouponResult<Vec<Coupon>> {
        Ok(up_to_price(self.coupons()?, max_price))
    }

    fn ensure_owned(&self, coupon_id: RecordId) -> CouponResult<()> {
        let owned = self.repos().links.company_coupons(self.company_id)?;
        if owned.contains(&coupon_id) {
            Ok(())
        } else {
            Err(CouponError::NotFound {
                kind: EntityKind::Coupon,
                id: coupon_id,
            })
        }
    }
}
