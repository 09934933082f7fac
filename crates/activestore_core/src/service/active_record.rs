//! Class-level record API available on every entity type.
//!
//! ```ignore
//! let alice = Author::find_or_create(&store, &attributes! { "name" => "Alice" })?;
//! let oldest = Author::query().order("age", false).first(1).records(&store)?;
//! Author::destroy_where(&store, attributes! { "name" => "Bob" })?;
//! ```

use crate::db::predicate::Predicate;
use crate::db::Store;
use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::model::value::Attributes;
use crate::repo::error::RecordResult;
use crate::repo::gateway::Gateway;
use crate::repo::query::Query;
use crate::service::cascade::{CascadeEngine, DestroyOptions};
use uuid::Uuid;

pub trait ActiveRecord: Entity + Sized {
    fn query() -> Query<Self> {
        Query::new()
    }

    fn find(store: &Store, uid: Uuid) -> RecordResult<Option<Record<Self>>> {
        Gateway::new(store).find(uid)
    }

    fn find_by(store: &Store, predicate: impl Into<Predicate>) -> RecordResult<Option<Record<Self>>> {
        Gateway::new(store).find_by(&predicate.into())
    }

    fn find_last_by(store: &Store, predicate: impl Into<Predicate>) -> RecordResult<Option<Record<Self>>> {
        Gateway::new(store).find_last_by(&predicate.into())
    }

    fn find_or_initialize(store: &Store, attributes: &Attributes) -> RecordResult<Record<Self>> {
        Gateway::new(store).find_or_initialize(attributes)
    }

    fn find_or_create(store: &Store, attributes: &Attributes) -> RecordResult<Record<Self>> {
        Gateway::new(store).find_or_create(attributes)
    }

    fn all(store: &Store) -> RecordResult<Vec<Record<Self>>> {
        Gateway::new(store).all()
    }

    fn all_ordered(store: &Store, attribute: &str, ascending: bool) -> RecordResult<Vec<Record<Self>>> {
        Gateway::new(store).all_ordered(attribute, ascending)
    }

    /// Oldest record.
    fn first(store: &Store) -> RecordResult<Option<Record<Self>>> {
        Self::query().first_record(store)
    }

    /// Newest record.
    fn last(store: &Store) -> RecordResult<Option<Record<Self>>> {
        Self::query().last_record(store)
    }

    fn first_n(store: &Store, count: usize) -> RecordResult<Vec<Record<Self>>> {
        Self::query().first(count).records(store)
    }

    fn last_n(store: &Store, count: usize) -> RecordResult<Vec<Record<Self>>> {
        Self::query().last(count).records(store)
    }

    fn count(store: &Store) -> RecordResult<u64> {
        Gateway::new(store).count::<Self>(&Predicate::new())
    }

    fn count_where(store: &Store, predicate: impl Into<Predicate>) -> RecordResult<u64> {
        Gateway::new(store).count::<Self>(&predicate.into())
    }

    /// Destroys every record with cascade. Returns rows removed.
    fn destroy_all(store: &Store) -> RecordResult<usize> {
        Self::destroy_all_with(store, DestroyOptions::default())
    }

    fn destroy_all_with(store: &Store, options: DestroyOptions) -> RecordResult<usize> {
        CascadeEngine::new(store).destroy_all::<Self>(options)
    }

    /// Destroys every match with cascade. Returns rows removed.
    fn destroy_where(store: &Store, predicate: impl Into<Predicate>) -> RecordResult<usize> {
        Self::destroy_where_with(store, predicate, DestroyOptions::default())
    }

    fn destroy_where_with(
        store: &Store,
        predicate: impl Into<Predicate>,
        options: DestroyOptions,
    ) -> RecordResult<usize> {
        CascadeEngine::new(store).destroy_where::<Self>(&predicate.into(), options)
    }
}

impl<E: Entity> ActiveRecord for E {}
