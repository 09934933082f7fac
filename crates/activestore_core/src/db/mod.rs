//! Embedded store binding: connections, migrations, entity tables and rows.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a [`StoreConfig`].
//! - Apply catalog migrations in deterministic order.
//! - Create/extend one table per registered entity type.
//! - Provide the row-level insert/update/delete/scan primitives.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Entity rows are never touched before their table is synchronized.
//! - A [`Store`] never leaves the thread that opened it.
//!
//! [`StoreConfig`]: crate::config::StoreConfig

use crate::model::schema::SchemaError;
use thiserror::Error;

pub mod default_store;
pub mod migrations;
mod open;
pub mod predicate;
pub(crate) mod rows;
mod schema_sync;
pub mod store;

pub use default_store::{close_default_store, with_default_store};
pub use open::open_connection;
pub use predicate::{Comparison, Predicate, SortOrder, Term};
pub use store::{Store, StoreId};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown column `{column}` on {entity}")]
    UnknownColumn {
        entity: &'static str,
        column: String,
    },
    #[error("invalid stored data in `{table}`: {message}")]
    InvalidData { table: String, message: String },
    #[error("no default store configuration has been set")]
    DefaultStoreNotConfigured,
    /// The thread's default store is already borrowed by an outer call.
    #[error("default store is already in use on this thread")]
    DefaultStoreInUse,
}
