//! Owner-scoped query helpers
//!
//! Every function takes `&impl ConnectionTrait`, so callers can hand in the
//! pool or an open transaction. Category and product lookups always filter on
//! the owning user; there is deliberately no unscoped variant.

pub mod categories;
pub mod products;
pub mod users;
