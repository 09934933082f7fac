//! Record services built on the gateway and resolver.
//!
//! # Responsibility
//! - Cascade deletion over inverse relationships.
//! - Dictionary/JSON projection of records.
//! - Handoff of records between store contexts.
//! - The class-level `ActiveRecord` API every entity type gets.

pub mod active_record;
pub mod cascade;
pub mod handoff;
pub mod serializer;
