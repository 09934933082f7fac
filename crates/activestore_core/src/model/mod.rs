//! Entity model: values, schemas, the entity contract and record handles.
//!
//! # Responsibility
//! - Define the data shapes shared by the store binding and the record API.
//! - Keep schema declarations static and separate from computed values.
//!
//! # Invariants
//! - A record is either new (never written) or persisted (has a `uid` and a
//!   matching stored row as of its last read or write).

pub mod entity;
pub mod record;
pub mod schema;
pub mod value;
