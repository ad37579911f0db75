//! Operations of a logged-in customer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::error::{CouponError, CouponResult};
use crate::core::model::{Coupon, CouponType, Customer, RecordId};
use crate::core::repository::Repositories;
use crate::util::clock::Clock;

use super::{of_type, up_to_price};

/// Operations available to one customer.
#[derive(Clone)]
pub struct CustomerFacade {
    customer_id: RecordId,
    repos: Repositories,
    clock: Arc<dyn Clock>,
}

impl CustomerFacade {
    /// Create a facade scoped to `customer_id`; `clock` decides expiry.
    pub fn new(customer_id: RecordId, repos: Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            customer_id,
            repos,
            clock,
        }
    }

    /// Id of the customer this facade acts for.
    #[must_use]
    pub const fn customer_id(&self) -> RecordId {
        self.customer_id
    }

    /// The customer's own record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the customer was deleted since login, `Store` on store failure.
    pub fn customer(&self) -> CouponResult<Customer> {
        self.repos.customers.get_by_id(self.customer_id)
    }

    /// Buy one unit of a coupon.
    ///
    /// The purchase link is written first, so a second concurrent purchase
    /// by the same customer fails on the duplicate link. Stock is then taken
    /// with a conditional decrement; when none is left the link is removed
    /// again. Returns the coupon with its remaining stock.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired`, `AlreadyPurchased`, `OutOfStock`, or `Store`.
    pub fn purchase_coupon(&self, coupon_id: RecordId) -> CouponResult<Coupon> {
        let mut coupon = self.repos.coupons.get_by_id(coupon_id)?;
        if coupon.is_expired_at(self.clock.now()) {
            return Err(CouponError::Expired(coupon_id));
        }
        if coupon.amount == 0 {
            return Err(CouponError::OutOfStock(coupon_id));
        }

        match self.repos.links.link_customer(self.customer_id, coupon_id) {
            Ok(()) => {}
            Err(CouponError::AlreadyExists { .. }) => {
                return Err(CouponError::AlreadyPurchased {
                    customer_id: self.customer_id,
                    coupon_id,
                });
            }
            Err(e) => return Err(e),
        }

        match self.repos.coupons.decrement_if_positive(coupon_id) {
            Ok(Some(remaining)) => {
                coupon.amount = remaining;
                info!(customer_id = self.customer_id, coupon_id, remaining, "coupon purchased");
                Ok(coupon)
            }
            Ok(None) => {
                debug!(customer_id = self.customer_id, coupon_id, "sold out during purchase");
                self.release_link(coupon_id);
                Err(CouponError::OutOfStock(coupon_id))
            }
            Err(e) => {
                self.release_link(coupon_id);
                Err(e)
            }
        }
    }

    fn release_link(&self, coupon_id: RecordId) {
        if let Err(e) = self.repos.links.unlink_customer_pair(self.customer_id, coupon_id) {
            warn!(
                customer_id = self.customer_id,
                coupon_id,
                error = %e,
                "failed to undo purchase link"
            );
        }
    }

    /// Every coupon this customer bought.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons(&self) -> CouponResult<Vec<Coupon>> {
        let ids = self.repos.links.customer_coupons(self.customer_id)?;
        self.repos.coupons_by_ids(&ids)
    }

    /// Purchased coupons of one category.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons_by_type(&self, kind: CouponType) -> CouponResult<Vec<Coupon>> {
        Ok(of_type(self.coupons()?, kind))
    }

    /// Purchased coupons priced at or below `max_price`.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons_up_to_price(&self, max_price: f64) -> CouponResult<Vec<Coupon>> {
        Ok(up_to_price(self.coupons()?, max_price))
    }
}
