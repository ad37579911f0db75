//! Relational schema for SQL-backed stores.

/// Table names in creation order.
pub const TABLES: [&str; 5] = [
    "Company",
    "Customer",
    "Coupon",
    "Company_Coupon",
    "Customer_Coupon",
];

const MIGRATIONS: [&str; 5] = [
    "CREATE TABLE Company (\
        id BIGINT PRIMARY KEY, \
        comp_name VARCHAR(50) NOT NULL UNIQUE, \
        password VARCHAR(50) NOT NULL, \
        email VARCHAR(50))",
    "CREATE TABLE Customer (\
        id BIGINT PRIMARY KEY, \
        cust_name VARCHAR(50) NOT NULL UNIQUE, \
        password VARCHAR(50) NOT NULL)",
    "CREATE TABLE Coupon (\
        id BIGINT PRIMARY KEY, \
        title VARCHAR(50) NOT NULL UNIQUE, \
        start_date TIMESTAMP NOT NULL, \
        end_date TIMESTAMP NOT NULL, \
        amount INTEGER NOT NULL CHECK (amount >= 0), \
        type VARCHAR(50) NOT NULL, \
        message VARCHAR(50), \
        price DOUBLE PRECISION NOT NULL, \
        image VARCHAR(50))",
    "CREATE TABLE Company_Coupon (\
        comp_id BIGINT NOT NULL, \
        coupon_id BIGINT NOT NULL, \
        PRIMARY KEY (comp_id, coupon_id))",
    "CREATE TABLE Customer_Coupon (\
        cust_id BIGINT NOT NULL, \
        coupon_id BIGINT NOT NULL, \
        PRIMARY KEY (cust_id, coupon_id))",
];

/// DDL statements creating every table, in [`TABLES`] order.
#[must_use]
pub const fn migrations() -> &'static [&'static str] {
    &MIGRATIONS
}

/// Conditional stock decrement; affects zero rows when the coupon is sold out.
pub const DECREMENT_IF_POSITIVE: &str =
    "UPDATE Coupon SET amount = amount - 1 WHERE id = $1 AND amount > 0 RETURNING amount";
