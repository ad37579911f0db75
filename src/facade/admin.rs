//! Administrator operations on companies and customers.

use tracing::{debug, info};

use crate::core::cascade::{CascadeCoordinator, CascadeReport};
use crate::core::error::{CouponError, CouponResult, EntityKind};
use crate::core::model::{Company, Coupon, Customer, Entity, RecordId};
use crate::core::repository::{Repositories, Repository};

/// Operations available to the administrator.
#[derive(Clone)]
pub struct AdminFacade {
    coordinator: CascadeCoordinator,
}

impl AdminFacade {
    /// Create an admin facade over `coordinator`'s repositories.
    pub const fn new(coordinator: CascadeCoordinator) -> Self {
        Self { coordinator }
    }

    fn repos(&self) -> &Repositories {
        self.coordinator.repositories()
    }

    /// Register a company. Names are unique.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` for a taken name or id, `Store` on store failure.
    pub fn create_company(&self, company: &Company) -> CouponResult<()> {
        ensure_unique_name(&*self.repos().companies, company.id, &company.name, |c| {
            c.name.as_str()
        })?;
        self.repos().companies.create(company)?;
        info!(company_id = company.id, name = %company.name, "company created");
        Ok(())
    }

    /// Delete a company with its coupons. `company.name` must match the stored record.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Mismatch`, or `Cascade`.
    pub fn remove_company(&self, company: &Company) -> CouponResult<CascadeReport> {
        let stored = self.repos().companies.get_by_id(company.id)?;
        ensure_same_name(Company::KIND, company.id, &stored.name, &company.name)?;
        self.coordinator.delete_company(company.id)
    }

    /// Change a company's password and email. The name cannot change.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Mismatch`, or `Store`.
    pub fn update_company(&self, company: &Company) -> CouponResult<()> {
        let mut stored = self.repos().companies.get_by_id(company.id)?;
        ensure_same_name(Company::KIND, company.id, &stored.name, &company.name)?;
        stored.password.clone_from(&company.password);
        stored.email.clone_from(&company.email);
        self.repos().companies.update(&stored)
    }

    /// Fetch one company.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Store`.
    pub fn company(&self, id: RecordId) -> CouponResult<Company> {
        self.repos().companies.get_by_id(id)
    }

    /// Every company.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn companies(&self) -> CouponResult<Vec<Company>> {
        self.repos().companies.get_all()
    }

    /// Register a customer. Names are unique.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` for a taken name or id, `Store` on store failure.
    pub fn create_customer(&self, customer: &Customer) -> CouponResult<()> {
        ensure_unique_name(&*self.repos().customers, customer.id, &customer.name, |c| {
            c.name.as_str()
        })?;
        self.repos().customers.create(customer)?;
        info!(customer_id = customer.id, name = %customer.name, "customer created");
        Ok(())
    }

    /// Delete a customer and its purchases. `customer.name` must match the stored record.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Mismatch`, or `Cascade`.
    pub fn remove_customer(&self, customer: &Customer) -> CouponResult<CascadeReport> {
        let stored = self.repos().customers.get_by_id(customer.id)?;
        ensure_same_name(Customer::KIND, customer.id, &stored.name, &customer.name)?;
        self.coordinator.delete_customer(customer.id)
    }

    /// Change a customer's password. The name cannot change.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Mismatch`, or `Store`.
    pub fn update_customer(&self, customer: &Customer) -> CouponResult<()> {
        let mut stored = self.repos().customers.get_by_id(customer.id)?;
        ensure_same_name(Customer::KIND, customer.id, &stored.name, &customer.name)?;
        stored.password.clone_from(&customer.password);
        self.repos().customers.update(&stored)
    }

    /// Fetch one customer.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Store`.
    pub fn customer(&self, id: RecordId) -> CouponResult<Customer> {
        self.repos().customers.get_by_id(id)
    }

    /// Every customer.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn customers(&self) -> CouponResult<Vec<Customer>> {
        self.repos().customers.get_all()
    }

    /// Every coupon of every company.
    ///
    /// # Errors
    ///
    /// `Store` on store failure.
    pub fn coupons(&self) -> CouponResult<Vec<Coupon>> {
        self.repos().coupons.get_all()
    }
}

fn ensure_unique_name<E: Entity>(
    repo: &dyn Repository<E>,
    id: RecordId,
    name: &str,
    name_of: impl Fn(&E) -> &str + Sync,
) -> CouponResult<()> {
    let taken = repo.get_by_predicate(&|row: &E| name_of(row) == name)?;
    if taken.is_empty() {
        Ok(())
    } else {
        debug!(kind = %E::KIND, id, name, "name already taken");
        Err(CouponError::AlreadyExists {
            kind: E::KIND,
            key: name.to_owned(),
        })
    }
}

fn ensure_same_name(
    kind: EntityKind,
    id: RecordId,
    stored: &str,
    supplied: &str,
) -> CouponResult<()> {
    if stored == supplied {
        Ok(())
    } else {
        Err(CouponError::Mismatch { kind, id })
    }
}
