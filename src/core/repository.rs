//! Data-access contracts the storage layer implements.
//!
//! Every operation borrows one pooled handle for its own duration and
//! returns it on every exit path. Absence is an error (`NotFound`), never an
//! empty success.

use std::sync::Arc;

use crate::core::error::CouponResult;
use crate::core::model::{Company, Coupon, Customer, Entity, RecordId};
use crate::core::resource_pool::{Connection, ResourcePool};

/// Predicate accepted by [`Repository::get_by_predicate`].
pub type Predicate<'a, E> = &'a (dyn Fn(&E) -> bool + Sync);

/// CRUD access to one record family.
pub trait Repository<E: Entity>: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` on a duplicate id, `Store` on store failure.
    fn create(&self, entity: &E) -> CouponResult<()>;

    /// Delete a record by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent, `Store` on store failure.
    fn remove(&self, id: RecordId) -> CouponResult<()>;

    /// Replace a record.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent, `Store` on store failure.
    fn update(&self, entity: &E) -> CouponResult<()>;

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent, `Store` on store failure.
    fn get_by_id(&self, id: RecordId) -> CouponResult<E>;

    /// Fetch every record, ordered by id.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    fn get_all(&self) -> CouponResult<Vec<E>>;

    /// Fetch records matching `predicate`, ordered by id.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    fn get_by_predicate(&self, predicate: Predicate<'_, E>) -> CouponResult<Vec<E>>;
}

/// Coupon access with an atomic stock decrement.
pub trait CouponRepository: Repository<Coupon> {
    /// Decrement `amount` only if it is positive, in one store operation.
    ///
    /// Returns the remaining stock, or `None` when the coupon was already at
    /// zero and nothing changed.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent, `Store` on store failure.
    fn decrement_if_positive(&self, id: RecordId) -> CouponResult<Option<u32>>;
}

/// Company/customer to coupon cross references.
pub trait LinkRepository: Send + Sync {
    /// Record that `company_id` issued `coupon_id`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` on a duplicate pair, `Store` on store failure.
    fn link_company(&self, company_id: RecordId, coupon_id: RecordId) -> CouponResult<()>;

    /// Record that `customer_id` owns `coupon_id`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` on a duplicate pair, `Store` on store failure.
    fn link_customer(&self, customer_id: RecordId, coupon_id: RecordId) -> CouponResult<()>;

    /// Remove the company reference to `coupon_id`; returns rows removed.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row matched, `Store` on store failure.
    fn unlink_company_coupon(&self, coupon_id: RecordId) -> CouponResult<usize>;

    /// Remove every customer reference to `coupon_id`; returns rows removed.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row matched, `Store` on store failure.
    fn unlink_customer_coupon(&self, coupon_id: RecordId) -> CouponResult<usize>;

    /// Remove one customer/coupon pair.
    ///
    /// # Errors
    ///
    /// `NotFound` when the pair does not exist, `Store` on store failure.
    fn unlink_customer_pair(&self, customer_id: RecordId, coupon_id: RecordId)
        -> CouponResult<()>;

    /// Coupon ids issued by `company_id`.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    fn company_coupons(&self, company_id: RecordId) -> CouponResult<Vec<RecordId>>;

    /// Coupon ids owned by `customer_id`.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    fn customer_coupons(&self, customer_id: RecordId) -> CouponResult<Vec<RecordId>>;
}

/// The repositories of one store, shared by facades, cascade, and sweeper.
#[derive(Clone)]
pub struct Repositories {
    /// Companies.
    pub companies: Arc<dyn Repository<Company>>,
    /// Customers.
    pub customers: Arc<dyn Repository<Customer>>,
    /// Coupons.
    pub coupons: Arc<dyn CouponRepository>,
    /// Cross references.
    pub links: Arc<dyn LinkRepository>,
}

impl Repositories {
    /// Load the coupons behind a list of ids, skipping ids whose row is gone.
    ///
    /// # Errors
    ///
    /// Any failure other than `NotFound`.
    pub fn coupons_by_ids(&self, ids: &[RecordId]) -> CouponResult<Vec<Coupon>> {
        let mut coupons = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.coupons.get_by_id(id) {
                Ok(coupon) => coupons.push(coupon),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(coupons)
    }
}

/// Storage layer seam: opens connections and builds repositories over a pool.
pub trait StoreBackend: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Conn: Connection;

    /// Open one live connection.
    ///
    /// # Errors
    ///
    /// `Store` with `Operation::Connect` when the store is unreachable.
    fn connect(&self) -> CouponResult<Self::Conn>;

    /// Build repositories that borrow from `pool`.
    fn repositories(&self, pool: &Arc<ResourcePool<Self::Conn>>) -> Repositories;
}
