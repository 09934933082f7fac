//! Active-record persistence over a thread-confined embedded store.
//!
//! Entity types declare a static schema and implement [`Entity`]; records
//! are saved, found, queried, related, serialized and destroyed (with
//! cascade) through an explicit [`Store`] handle per thread.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{default_config, set_default_config, ConfigError, StoreConfig, StoreLocation};
pub use db::{
    close_default_store, with_default_store, Comparison, DbError, DbResult, Predicate, SortOrder,
    Store, StoreId, Term,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{Entity, ValidationError};
pub use model::record::{Record, RecordMeta};
pub use model::schema::{
    foreign_key_for, AttributeDecl, Cardinality, Direction, EntitySchema, EntitySchemaBuilder,
    RelationshipDecl, SchemaError,
};
pub use model::value::{AttrKind, Attributes, KindMismatch, Value};
pub use repo::error::{RecordError, RecordResult};
pub use repo::gateway::{Gateway, SaveOptions};
pub use repo::query::{Limit, Query};
pub use repo::relation::{BelongsTo, HasMany, HasOne};
pub use service::active_record::ActiveRecord;
pub use service::cascade::{CascadeEngine, DestroyOptions};
pub use service::handoff::{handoff, RecordRef};
pub use service::serializer::{Computation, ComputationReceiver, Selection, Serializer};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
