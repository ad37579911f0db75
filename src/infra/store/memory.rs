//! In-memory store backend.
//!
//! Tables live behind one `parking_lot::Mutex` shared by every connection.
//! Each repository call borrows a pooled connection for the duration of one
//! table operation, so pool capacity bounds store concurrency exactly as it
//! would for a remote database. Latency and per-operation faults can be
//! injected for tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::core::error::{CouponError, CouponResult, EntityKind, Operation};
use crate::core::model::{Company, Coupon, Customer, Entity, RecordId};
use crate::core::repository::{
    CouponRepository, LinkRepository, Predicate, Repositories, Repository, StoreBackend,
};
use crate::core::resource_pool::{Connection, ResourcePool};

#[derive(Default)]
struct Tables {
    companies: BTreeMap<RecordId, Company>,
    customers: BTreeMap<RecordId, Customer>,
    coupons: BTreeMap<RecordId, Coupon>,
    /// `(company_id, coupon_id)`
    company_coupons: BTreeSet<(RecordId, RecordId)>,
    /// `(customer_id, coupon_id)`
    customer_coupons: BTreeSet<(RecordId, RecordId)>,
}

#[derive(Default)]
struct Faults {
    failing: HashSet<(Operation, EntityKind)>,
    unavailable: bool,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    open_connections: AtomicUsize,
    connections_opened: AtomicUsize,
}

/// Shared in-memory database. Clones refer to the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every table operation for `latency` before it runs.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.faults.lock().latency = Some(latency);
        self
    }

    /// Make every `operation` on `kind` fail with a `Store` error until [`heal`](Self::heal).
    pub fn fail_on(&self, operation: Operation, kind: EntityKind) {
        debug!(%operation, %kind, "store fault injected");
        self.inner.faults.lock().failing.insert((operation, kind));
    }

    /// Clear injected faults and mark the store reachable again. Latency is kept.
    pub fn heal(&self) {
        let mut faults = self.inner.faults.lock();
        faults.failing.clear();
        faults.unavailable = false;
    }

    /// Refuse new connections while `unavailable` is true.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.faults.lock().unavailable = unavailable;
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.inner.open_connections.load(Ordering::SeqCst)
    }

    /// Connections opened since the store was created.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.inner.connections_opened.load(Ordering::SeqCst)
    }

    /// Number of `(company, coupon)` and `(customer, coupon)` rows.
    #[must_use]
    pub fn link_counts(&self) -> (usize, usize) {
        let tables = self.inner.tables.lock();
        (tables.company_coupons.len(), tables.customer_coupons.len())
    }
}

/// One logical connection to a [`MemoryStore`].
pub struct MemoryConnection {
    inner: Arc<Inner>,
    open: bool,
}

impl MemoryConnection {
    /// Run one table operation, applying injected latency and faults.
    fn run<T>(
        &self,
        operation: Operation,
        kind: EntityKind,
        f: impl FnOnce(&mut Tables) -> CouponResult<T>,
    ) -> CouponResult<T> {
        if !self.open {
            return Err(CouponError::store(operation, kind, "connection is closed"));
        }
        let latency = {
            let faults = self.inner.faults.lock();
            if faults.failing.contains(&(operation, kind)) {
                return Err(CouponError::store(operation, kind, "injected store fault"));
            }
            faults.latency
        };
        if let Some(latency) = latency {
            thread::sleep(latency);
        }
        trace!(%operation, %kind, "store operation");
        let mut tables = self.inner.tables.lock();
        f(&mut tables)
    }
}

impl Connection for MemoryConnection {
    fn close(&mut self) -> CouponResult<()> {
        if self.open {
            self.open = false;
            self.inner.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl StoreBackend for MemoryStore {
    type Conn = MemoryConnection;

    fn connect(&self) -> CouponResult<MemoryConnection> {
        if self.inner.faults.lock().unavailable {
            return Err(CouponError::store(
                Operation::Connect,
                EntityKind::Coupon,
                "store unavailable",
            ));
        }
        self.inner.open_connections.fetch_add(1, Ordering::SeqCst);
        self.inner.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            inner: Arc::clone(&self.inner),
            open: true,
        })
    }

    fn repositories(&self, pool: &Arc<ResourcePool<MemoryConnection>>) -> Repositories {
        Repositories {
            companies: Arc::new(MemoryRepository::<Company>::new(pool)),
            customers: Arc::new(MemoryRepository::<Customer>::new(pool)),
            coupons: Arc::new(MemoryRepository::<Coupon>::new(pool)),
            links: Arc::new(MemoryLinkRepository {
                pool: Arc::clone(pool),
            }),
        }
    }
}

trait MemoryTable: Entity {
    fn rows(tables: &mut Tables) -> &mut BTreeMap<RecordId, Self>;
}

impl MemoryTable for Company {
    fn rows(tables: &mut Tables) -> &mut BTreeMap<RecordId, Self> {
        &mut tables.companies
    }
}

impl MemoryTable for Customer {
    fn rows(tables: &mut Tables) -> &mut BTreeMap<RecordId, Self> {
        &mut tables.customers
    }
}

impl MemoryTable for Coupon {
    fn rows(tables: &mut Tables) -> &mut BTreeMap<RecordId, Self> {
        &mut tables.coupons
    }
}

struct MemoryRepository<E> {
    pool: Arc<ResourcePool<MemoryConnection>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: MemoryTable> MemoryRepository<E> {
    fn new(pool: &Arc<ResourcePool<MemoryConnection>>) -> Self {
        Self {
            pool: Arc::clone(pool),
            _entity: PhantomData,
        }
    }

    fn with_rows<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&mut BTreeMap<RecordId, E>) -> CouponResult<T>,
    ) -> CouponResult<T> {
        let conn = self.pool.get()?;
        conn.run(operation, E::KIND, |tables| f(E::rows(tables)))
    }
}

const fn not_found(kind: EntityKind, id: RecordId) -> CouponError {
    CouponError::NotFound { kind, id }
}

impl<E: MemoryTable> Repository<E> for MemoryRepository<E> {
    fn create(&self, entity: &E) -> CouponResult<()> {
        let id = entity.id();
        self.with_rows(Operation::Create, |rows| {
            if rows.contains_key(&id) {
                return Err(CouponError::AlreadyExists {
                    kind: E::KIND,
                    key: id.to_string(),
                });
            }
            rows.insert(id, entity.clone());
            Ok(())
        })
    }

    fn remove(&self, id: RecordId) -> CouponResult<()> {
        self.with_rows(Operation::Remove, |rows| {
            rows.remove(&id).map(|_| ()).ok_or(not_found(E::KIND, id))
        })
    }

    fn update(&self, entity: &E) -> CouponResult<()> {
        let id = entity.id();
        self.with_rows(Operation::Update, |rows| match rows.get_mut(&id) {
            Some(row) => {
                *row = entity.clone();
                Ok(())
            }
            None => Err(not_found(E::KIND, id)),
        })
    }

    fn get_by_id(&self, id: RecordId) -> CouponResult<E> {
        self.with_rows(Operation::Get, |rows| {
            rows.get(&id).cloned().ok_or(not_found(E::KIND, id))
        })
    }

    fn get_all(&self) -> CouponResult<Vec<E>> {
        self.with_rows(Operation::List, |rows| Ok(rows.values().cloned().collect()))
    }

    fn get_by_predicate(&self, predicate: Predicate<'_, E>) -> CouponResult<Vec<E>> {
        self.with_rows(Operation::Query, |rows| {
            Ok(rows.values().filter(|row| predicate(row)).cloned().collect())
        })
    }
}

impl CouponRepository for MemoryRepository<Coupon> {
    fn decrement_if_positive(&self, id: RecordId) -> CouponResult<Option<u32>> {
        self.with_rows(Operation::Update, |rows| {
            let coupon = rows.get_mut(&id).ok_or(not_found(EntityKind::Coupon, id))?;
            if coupon.amount == 0 {
                return Ok(None);
            }
            coupon.amount -= 1;
            Ok(Some(coupon.amount))
        })
    }
}

struct MemoryLinkRepository {
    pool: Arc<ResourcePool<MemoryConnection>>,
}

impl MemoryLinkRepository {
    fn with_tables<T>(
        &self,
        operation: Operation,
        kind: EntityKind,
        f: impl FnOnce(&mut Tables) -> CouponResult<T>,
    ) -> CouponResult<T> {
        let conn = self.pool.get()?;
        conn.run(operation, kind, f)
    }
}

fn insert_pair(
    set: &mut BTreeSet<(RecordId, RecordId)>,
    kind: EntityKind,
    pair: (RecordId, RecordId),
) -> CouponResult<()> {
    if set.insert(pair) {
        Ok(())
    } else {
        Err(CouponError::AlreadyExists {
            kind,
            key: format!("{}/{}", pair.0, pair.1),
        })
    }
}

fn remove_by_coupon(
    set: &mut BTreeSet<(RecordId, RecordId)>,
    kind: EntityKind,
    coupon_id: RecordId,
) -> CouponResult<usize> {
    let before = set.len();
    set.retain(|&(_, coupon)| coupon != coupon_id);
    match before - set.len() {
        0 => Err(not_found(kind, coupon_id)),
        removed => Ok(removed),
    }
}

fn coupons_of(set: &BTreeSet<(RecordId, RecordId)>, owner: RecordId) -> Vec<RecordId> {
    set.range((owner, RecordId::MIN)..=(owner, RecordId::MAX))
        .map(|&(_, coupon)| coupon)
        .collect()
}

impl LinkRepository for MemoryLinkRepository {
    fn link_company(&self, company_id: RecordId, coupon_id: RecordId) -> CouponResult<()> {
        let kind = EntityKind::CompanyCoupon;
        self.with_tables(Operation::Create, kind, |t| {
            insert_pair(&mut t.company_coupons, kind, (company_id, coupon_id))
        })
    }

    fn link_customer(&self, customer_id: RecordId, coupon_id: RecordId) -> CouponResult<()> {
        let kind = EntityKind::CustomerCoupon;
        self.with_tables(Operation::Create, kind, |t| {
            insert_pair(&mut t.customer_coupons, kind, (customer_id, coupon_id))
        })
    }

    fn unlink_company_coupon(&self, coupon_id: RecordId) -> CouponResult<usize> {
        let kind = EntityKind::CompanyCoupon;
        self.with_tables(Operation::Remove, kind, |t| {
            remove_by_coupon(&mut t.company_coupons, kind, coupon_id)
        })
    }

    fn unlink_customer_coupon(&self, coupon_id: RecordId) -> CouponResult<usize> {
        let kind = EntityKind::CustomerCoupon;
        self.with_tables(Operation::Remove, kind, |t| {
            remove_by_coupon(&mut t.customer_coupons, kind, coupon_id)
        })
    }

    fn unlink_customer_pair(
        &self,
        customer_id: RecordId,
        coupon_id: RecordId,
    ) -> CouponResult<()> {
        let kind = EntityKind::CustomerCoupon;
        self.with_tables(Operation::Remove, kind, |t| {
            if t.customer_coupons.remove(&(customer_id, coupon_id)) {
                Ok(())
            } else {
                Err(not_found(kind, coupon_id))
            }
        })
    }

    fn company_coupons(&self, company_id: RecordId) -> CouponResult<Vec<RecordId>> {
        self.with_tables(Operation::Query, EntityKind::CompanyCoupon, |t| {
            Ok(coupons_of(&t.company_coupons, company_id))
        })
    }

    fn customer_coupons(&self, customer_id: RecordId) -> CouponResult<Vec<RecordId>> {
        self.with_tables(Operation::Query, EntityKind::CustomerCoupon, |t| {
            Ok(coupons_of(&t.customer_coupons, customer_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::CouponType;
    use crate::core::resource_pool::PoolLimits;
    use chrono::{Duration as Days, Utc};

    fn setup(capacity: usize) -> (MemoryStore, Arc<ResourcePool<MemoryConnection>>, Repositories) {
        let store = MemoryStore::new();
        let conns = (0..capacity).map(|_| store.connect().unwrap()).collect();
        let pool = Arc::new(ResourcePool::new(PoolLimits::default(), conns).unwrap());
        let repos = store.repositories(&pool);
        (store, pool, repos)
    }

    fn coupon(id: RecordId, amount: u32) -> Coupon {
        let now = Utc::now();
        Coupon::new(id, format!("coupon-{id}"), CouponType::Food, now, now + Days::days(7))
            .with_amount(amount)
    }

    #[test]
    fn test_crud_and_not_found() {
        let (_store, pool, repos) = setup(1);
        let acme = Company::new(1, "acme", "pw", "a@acme.test");
        repos.companies.create(&acme).unwrap();
        assert!(matches!(
            repos.companies.create(&acme),
            Err(CouponError::AlreadyExists { .. })
        ));

        let mut renamed = acme.clone();
        renamed.email = "b@acme.test".into();
        repos.companies.update(&renamed).unwrap();
        assert_eq!(repos.companies.get_by_id(1).unwrap().email, "b@acme.test");

        repos.companies.remove(1).unwrap();
        assert!(repos.companies.get_by_id(1).unwrap_err().is_not_found());
        assert!(repos.companies.remove(1).unwrap_err().is_not_found());
        assert_eq!(pool.stats().available, 1);
    }

    #[test]
    fn test_predicate_query() {
        let (_store, _pool, repos) = setup(2);
        repos.customers.create(&Customer::new(1, "dana", "x")).unwrap();
        repos.customers.create(&Customer::new(2, "eli", "y")).unwrap();
        let found = repos
            .customers
            .get_by_predicate(&|c: &Customer| c.name == "eli")
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[test]
    fn test_decrement_stops_at_zero() {
        let (_store, _pool, repos) = setup(1);
        repos.coupons.create(&coupon(5, 1)).unwrap();
        assert_eq!(repos.coupons.decrement_if_positive(5).unwrap(), Some(0));
        assert_eq!(repos.coupons.decrement_if_positive(5).unwrap(), None);
        assert_eq!(repos.coupons.get_by_id(5).unwrap().amount, 0);
    }

    #[test]
    fn test_links_unlink_and_query() {
        let (store, _pool, repos) = setup(1);
        repos.links.link_company(1, 10).unwrap();
        repos.links.link_company(1, 11).unwrap();
        repos.links.link_customer(7, 10).unwrap();
        repos.links.link_customer(8, 10).unwrap();
        assert!(repos.links.link_customer(7, 10).is_err());

        assert_eq!(repos.links.company_coupons(1).unwrap(), vec![10, 11]);
        assert_eq!(repos.links.unlink_customer_coupon(10).unwrap(), 2);
        assert!(repos.links.unlink_customer_coupon(10).unwrap_err().is_not_found());
        assert!(repos.links.unlink_customer_pair(7, 10).unwrap_err().is_not_found());
        assert_eq!(store.link_counts(), (2, 0));
    }

    #[test]
    fn test_injected_fault_and_heal() {
        let (store, pool, repos) = setup(1);
        store.fail_on(Operation::List, EntityKind::Coupon);
        assert!(matches!(
            repos.coupons.get_all(),
            Err(CouponError::Store {
                operation: Operation::List,
                ..
            })
        ));
        assert_eq!(pool.stats().available, 1);
        store.heal();
        assert!(repos.coupons.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_connection_accounting() {
        let (store, pool, _repos) = setup(3);
        assert_eq!(store.open_connections(), 3);
        pool.shutdown();
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.connections_opened(), 3);

        store.set_unavailable(true);
        assert!(store.connect().is_err());
    }
}
