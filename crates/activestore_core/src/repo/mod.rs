//! Record-level access: persistence gateway, query builder and
//! relationship resolver.
//!
//! # Responsibility
//! - Translate typed record operations into row primitives on a [`Store`].
//! - Keep SQL details inside the `db` boundary.
//!
//! # Invariants
//! - Write paths validate the entity before any store mutation.
//! - Each operation touches the store through the caller's [`Store`] only;
//!   records from another store are rejected, not silently re-read.
//!
//! [`Store`]: crate::db::Store

pub mod error;
pub mod gateway;
pub mod query;
pub mod relation;
