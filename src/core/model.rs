//! Records managed by the system.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::EntityKind;

/// Identifier shared by every record family.
pub type RecordId = u64;

/// A record stored by a [`Repository`](crate::core::Repository).
pub trait Entity: Clone + Send + Sync + 'static {
    /// Record family, used in errors and logs.
    const KIND: EntityKind;

    /// Primary key.
    fn id(&self) -> RecordId;
}

/// A record that can log in with a name and password.
pub trait Credentialed: Entity {
    /// Unique login name.
    fn login_name(&self) -> &str;
    /// Stored password.
    fn password(&self) -> &str;

    /// True when both name and password match.
    fn matches(&self, name: &str, password: &str) -> bool {
        self.login_name() == name && self.password() == password
    }
}

/// Kind of client logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// System administrator.
    Admin,
    /// A coupon-issuing company.
    Company,
    /// A coupon-buying customer.
    Customer,
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admin => "admin",
            Self::Company => "company",
            Self::Customer => "customer",
        };
        f.write_str(name)
    }
}

/// Coupon category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// Restaurants.
    Restaurants,
    /// Electricity.
    Electricity,
    /// Food.
    Food,
    /// Health.
    Health,
    /// Sports.
    Sports,
    /// Camping.
    Camping,
    /// Travelling.
    Travelling,
}

/// A coupon-issuing company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Primary key.
    pub id: RecordId,
    /// Unique company name, also the login name.
    pub name: String,
    /// Login password.
    pub password: String,
    /// Contact email.
    pub email: String,
}

impl Company {
    /// Create a company record.
    pub fn new(
        id: RecordId,
        name: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

impl Entity for Company {
    const KIND: EntityKind = EntityKind::Company;

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Credentialed for Company {
    fn login_name(&self) -> &str {
        &self.name
    }

    fn password(&self) -> &str {
        &self.password
    }
}

/// A coupon-buying customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Primary key.
    pub id: RecordId,
    /// Unique customer name, also the login name.
    pub name: String,
    /// Login password.
    pub password: String,
}

impl Customer {
    /// Create a customer record.
    pub fn new(id: RecordId, name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            password: password.into(),
        }
    }
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Credentialed for Customer {
    fn login_name(&self) -> &str {
        &self.name
    }

    fn password(&self) -> &str {
        &self.password
    }
}

/// A purchasable coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    /// Primary key.
    pub id: RecordId,
    /// Unique title.
    pub title: String,
    /// First instant the coupon is valid.
    pub start_date: DateTime<Utc>,
    /// Instant after which the coupon is expired.
    pub end_date: DateTime<Utc>,
    /// Remaining stock.
    pub amount: u32,
    /// Category.
    pub kind: CouponType,
    /// Free-form description.
    pub message: String,
    /// Unit price.
    pub price: f64,
    /// Image reference.
    pub image: String,
}

impl Coupon {
    /// Create a coupon with one unit of stock, zero price, and no message or image.
    pub fn new(
        id: RecordId,
        title: impl Into<String>,
        kind: CouponType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            start_date,
            end_date,
            amount: 1,
            kind,
            message: String::new(),
            price: 0.0,
            image: String::new(),
        }
    }

    /// Set the stock.
    #[must_use]
    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }

    /// Set the unit price.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// True when the end date lies strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }
}

impl Entity for Coupon {
    const KIND: EntityKind = EntityKind::Coupon;

    fn id(&self) -> RecordId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(end_date: DateTime<Utc>) -> Coupon {
        Coupon::new(1, "t", CouponType::Food, end_date - Duration::days(10), end_date)
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        assert!(coupon(now - Duration::seconds(1)).is_expired_at(now));
        assert!(!coupon(now).is_expired_at(now));
        assert!(!coupon(now + Duration::seconds(1)).is_expired_at(now));
    }

    #[test]
    fn test_credentials_match() {
        let company = Company::new(1, "acme", "pw", "a@acme.test");
        assert!(company.matches("acme", "pw"));
        assert!(!company.matches("acme", "nope"));
        assert!(!company.matches("other", "pw"));
    }
}
