//! Error types for pool, repository, cascade, and lifecycle operations.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::cascade::CascadeStep;
use crate::core::model::ClientType;

/// Record family an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Company rows.
    Company,
    /// Customer rows.
    Customer,
    /// Coupon rows.
    Coupon,
    /// Company to coupon cross references.
    CompanyCoupon,
    /// Customer to coupon cross references.
    CustomerCoupon,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Company => "company",
            Self::Customer => "customer",
            Self::Coupon => "coupon",
            Self::CompanyCoupon => "company coupon",
            Self::CustomerCoupon => "customer coupon",
        };
        f.write_str(name)
    }
}

/// Store-level operation, used for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Open a connection.
    Connect,
    /// Insert a row.
    Create,
    /// Delete a row.
    Remove,
    /// Update a row.
    Update,
    /// Read a single row by id.
    Get,
    /// Read every row.
    List,
    /// Read rows matching a predicate.
    Query,
    /// Close a connection.
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Get => "get",
            Self::List => "list",
            Self::Query => "query",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Errors produced by the coupon system.
#[derive(Debug, Error)]
pub enum CouponError {
    /// The pool is shut down or shutting down.
    #[error("connection pool is closed")]
    PoolClosed,
    /// No handle became available within the allowed wait.
    #[error("no connection available within {0:?}")]
    AcquireTimeout(Duration),
    /// A handle was returned that the pool cannot take back.
    #[error("invalid release of handle {handle}: {reason}")]
    InvalidRelease {
        /// Slot id of the offending handle.
        handle: usize,
        /// Why the release was rejected.
        reason: &'static str,
    },
    /// The requested record does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record family.
        kind: EntityKind,
        /// Requested id.
        id: u64,
    },
    /// A record with the same identity already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Record family.
        kind: EntityKind,
        /// Conflicting id or unique name.
        key: String,
    },
    /// The backing store failed.
    #[error("{operation} {kind} failed: {cause}")]
    Store {
        /// Operation that failed.
        operation: Operation,
        /// Record family.
        kind: EntityKind,
        /// Underlying failure.
        cause: String,
    },
    /// A cascade delete stopped partway; completed steps are not undone.
    #[error("cascade delete of {owner} {owner_id} failed at {step}: {source}")]
    Cascade {
        /// Record family whose deletion was requested.
        owner: EntityKind,
        /// Id of that record.
        owner_id: u64,
        /// Step that failed.
        step: CascadeStep,
        /// Failure of that step.
        #[source]
        source: Box<CouponError>,
    },
    /// Credentials were rejected.
    #[error("login failed for {0}")]
    AuthFailed(ClientType),
    /// The id and the name/title supplied by the caller refer to different records.
    #[error("{kind} {id} does not match the supplied name")]
    Mismatch {
        /// Record family.
        kind: EntityKind,
        /// Supplied id.
        id: u64,
    },
    /// The coupon has no remaining stock.
    #[error("coupon {0} is out of stock")]
    OutOfStock(u64),
    /// The coupon end date has passed.
    #[error("coupon {0} has expired")]
    Expired(u64),
    /// The customer already owns this coupon.
    #[error("customer {customer_id} already owns coupon {coupon_id}")]
    AlreadyPurchased {
        /// Customer id.
        customer_id: u64,
        /// Coupon id.
        coupon_id: u64,
    },
    /// The expiration sweeper did not stop in time.
    #[error("expiration sweeper did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure (thread spawn, worker panic).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CouponError {
    /// Build a store failure.
    pub fn store(operation: Operation, kind: EntityKind, cause: impl Into<String>) -> Self {
        Self::Store {
            operation,
            kind,
            cause: cause.into(),
        }
    }

    /// True for the expected "record does not exist" condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for `PoolClosed`, including one wrapped by a cascade step.
    #[must_use]
    pub fn is_pool_closed(&self) -> bool {
        match self {
            Self::PoolClosed => true,
            Self::Cascade { source, .. } => source.is_pool_closed(),
            _ => false,
        }
    }
}

/// Result alias used across the crate.
pub type CouponResult<T> = Result<T, CouponError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
