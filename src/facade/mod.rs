//! Client-facing operations, one facade per client type.
//!
//! A facade is obtained from [`CouponSystem::login`](crate::core::CouponSystem::login)
//! and carries the identity it was issued for; company and customer facades
//! only see their own coupons.

pub mod admin;
pub mod company;
pub mod customer;

pub use admin::AdminFacade;
pub use company::CompanyFacade;
pub use customer::CustomerFacade;

use std::fmt;

use crate::core::model::{ClientType, Coupon, CouponType};

/// Capability returned by a successful login.
#[derive(Clone)]
pub enum Session {
    /// Administrator session.
    Admin(AdminFacade),
    /// Session scoped to one company.
    Company(CompanyFacade),
    /// Session scoped to one customer.
    Customer(CustomerFacade),
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_type", &self.client_type())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Client type this session was issued for.
    #[must_use]
    pub const fn client_type(&self) -> ClientType {
        match self {
            Self::Admin(_) => ClientType::Admin,
            Self::Company(_) => ClientType::Company,
            Self::Customer(_) => ClientType::Customer,
        }
    }

    /// The admin facade, if this is an admin session.
    #[must_use]
    pub fn into_admin(self) -> Option<AdminFacade> {
        match self {
            Self::Admin(facade) => Some(facade),
            _ => None,
        }
    }

    /// The company facade, if this is a company session.
    #[must_use]
    pub fn into_company(self) -> Option<CompanyFacade> {
        match self {
            Self::Company(facade) => Some(facade),
            _ => None,
        }
    }

    /// The customer facade, if this is a customer session.
    #[must_use]
    pub fn into_customer(self) -> Option<CustomerFacade> {
        match self {
            Self::Customer(facade) => Some(facade),
            _ => None,
        }
    }
}

fn of_type(coupons: Vec<Coupon>, kind: CouponType) -> Vec<Coupon> {
    coupons.into_iter().filter(|c| c.kind == kind).collect()
}

fn up_to_price(coupons: Vec<Coupon>, max_price: f64) -> Vec<Coupon> {
    coupons.into_iter().filter(|c| c.price <= max_price).collect()
}
