//! Record-level error type shared by the gateway, resolver, query builder
//! and services.

use crate::db::{DbError, StoreId};
use crate::model::entity::ValidationError;
use crate::model::schema::SchemaError;
use thiserror::Error;

pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Debug, Error)]
pub enum RecordError {
    /// Save rejected before any store mutation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The operation needs a persisted `uid`.
    #[error("{entity} record has no uid; save it first")]
    UnsavedRecord { entity: &'static str },
    #[error("{entity} has no attribute `{attribute}`")]
    UnknownAttribute {
        entity: &'static str,
        attribute: String,
    },
    #[error("{entity} receiver has no computation `{name}`")]
    UnknownComputation { entity: &'static str, name: String },
    /// The record was fetched through another store; hand it off first.
    #[error("{entity} record belongs to {owner}, not {current}")]
    ContextMismatch {
        entity: &'static str,
        owner: StoreId,
        current: StoreId,
    },
    #[error("invalid {entity} data: {message}")]
    InvalidData {
        entity: &'static str,
        message: String,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("json encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    /// Underlying store failure, including failed commits.
    #[error(transparent)]
    Store(DbError),
}

impl RecordError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<DbError> for RecordError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::UnknownColumn { entity, column } => Self::UnknownAttribute {
                entity,
                attribute: column,
            },
            DbError::Schema(err) => Self::Schema(err),
            other => Self::Store(other),
        }
    }
}

impl From<rusqlite::Error> for RecordError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::RecordError;
    use crate::db::DbError;

    #[test]
    fn unknown_column_surfaces_as_unknown_attribute() {
        let error = RecordError::from(DbError::UnknownColumn {
            entity: "Author",
            column: "nickname".to_string(),
        });
        assert!(matches!(
            error,
            RecordError::UnknownAttribute { entity: "Author", ref attribute } if attribute == "nickname"
        ));
    }
}
