//! Typed relationship declarations and the lazy resolver behind them.
//!
//! # Responsibility
//! - Offer one typed constant per relationship kind, used both to declare the
//!   relationship in a schema and to resolve it on a record.
//! - Resolve exactly one hop per access and cache the result on the record.
//!
//! # Invariants
//! - Resolution never walks further than the requested relationship, so
//!   cyclic and self-referential declarations cannot recurse.
//! - A cached value is reused only while the store, its deletion epoch and
//!   the anchoring key (foreign key or own `uid`) are unchanged.
//! - A foreign key naming a missing record resolves to nothing and is logged
//!   as `relation_dangling`; it is never an error.

use crate::db::predicate::Predicate;
use crate::db::rows::Window;
use crate::db::Store;
use crate::model::entity::Entity;
use crate::model::record::{CacheKey, Record};
use crate::model::schema::{Cardinality, Direction, RelationshipDecl, SchemaError};
use crate::model::value::Value;
use crate::repo::error::RecordResult;
use crate::repo::gateway::Gateway;
use crate::repo::query::Query;
use log::warn;
use std::marker::PhantomData;
use uuid::Uuid;

macro_rules! relationship_kind {
    ($(#[$doc:meta])* $kind:ident<$owner:ident, $target:ident>, $cardinality:ident, $direction:ident) => {
        $(#[$doc])*
        pub struct $kind<$owner, $target> {
            name: &'static str,
            foreign_key: Option<&'static str>,
            _types: PhantomData<fn() -> ($owner, $target)>,
        }

        impl<$owner: Entity, $target: Entity> $kind<$owner, $target> {
            /// Declaration using the conventional foreign-key name.
            pub const fn new(name: &'static str) -> Self {
                Self {
                    name,
                    foreign_key: None,
                    _types: PhantomData,
                }
            }

            pub const fn with_foreign_key(name: &'static str, foreign_key: &'static str) -> Self {
                Self {
                    name,
                    foreign_key: Some(foreign_key),
                    _types: PhantomData,
                }
            }

            pub fn name(&self) -> &'static str {
                self.name
            }

            /// Schema entry for [`EntitySchemaBuilder::relationship`].
            ///
            /// [`EntitySchemaBuilder::relationship`]: crate::model::schema::EntitySchemaBuilder::relationship
            pub fn declaration(&self) -> RelationshipDecl {
                let decl = RelationshipDecl::new(
                    self.name,
                    Cardinality::$cardinality,
                    Direction::$direction,
                    $target::schema,
                );
                match self.foreign_key {
                    Some(foreign_key) => decl.with_foreign_key(foreign_key),
                    None => decl,
                }
            }

            fn resolve_declaration(&self) -> RecordResult<RelationshipDecl> {
                let schema = $owner::schema();
                let decl = schema
                    .relationship(self.name)
                    .copied()
                    .filter(|decl| {
                        decl.cardinality() == Cardinality::$cardinality
                            && decl.direction() == Direction::$direction
                            && decl.related().type_name() == $target::schema().type_name()
                    })
                    .ok_or_else(|| SchemaError::UndeclaredRelationship {
                        entity: schema.type_name(),
                        name: self.name.to_string(),
                    })?;
                Ok(decl)
            }
        }

        impl<$owner, $target> Clone for $kind<$owner, $target> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<$owner, $target> Copy for $kind<$owner, $target> {}

        impl<$owner, $target> std::fmt::Debug for $kind<$owner, $target> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($kind))
                    .field("name", &self.name)
                    .field("foreign_key", &self.foreign_key)
                    .finish()
            }
        }
    };
}

relationship_kind!(
    /// `O` holds a foreign key to one `R`.
    BelongsTo<O, R>, One, Owning
);
relationship_kind!(
    /// One `D` holds a foreign key back to `O`; destroying `O` destroys it.
    HasOne<O, D>, One, Inverse
);
relationship_kind!(
    /// Many `D` hold a foreign key back to `O`; destroying `O` destroys them.
    HasMany<O, D>, Many, Inverse
);

impl<E: Entity> Record<E> {
    /// Resolves an owning relationship.
    ///
    /// # Errors
    /// - [`crate::RecordError::Schema`] when `relation` is not declared on `E`.
    /// - [`crate::RecordError::ContextMismatch`] for records of another store.
    pub fn belongs_to<R: Entity>(
        &mut self,
        store: &Store,
        relation: &BelongsTo<E, R>,
    ) -> RecordResult<Option<&mut Record<R>>> {
        let decl = relation.resolve_declaration()?;
        self.check_context(store)?;
        let anchor = match self.get(&decl.foreign_key())? {
            Value::Text(key) if !key.is_empty() => Some(key),
            _ => None,
        };
        let key = cache_key(store, anchor.clone());
        if !self.relations.is_fresh::<Option<Record<R>>>(decl.name(), &key) {
            let resolved = match anchor.as_deref() {
                Some(raw) => resolve_owner::<E, R>(store, &decl, raw)?,
                None => None,
            };
            self.relations.insert(decl.name(), key, resolved);
        }
        Ok(self
            .relations
            .get_mut::<Option<Record<R>>>(decl.name())
            .and_then(Option::as_mut))
    }

    /// Resolves an inverse one-to-one relationship: the first `D` (creation
    /// order) whose foreign key names this record.
    ///
    /// # Errors
    /// - [`crate::RecordError::UnsavedRecord`] when this record has no `uid`.
    pub fn has_one<D: Entity>(
        &mut self,
        store: &Store,
        relation: &HasOne<E, D>,
    ) -> RecordResult<Option<&mut Record<D>>> {
        let decl = relation.resolve_declaration()?;
        let uid = self.require_uid()?;
        self.check_context(store)?;
        let key = cache_key(store, Some(uid.to_string()));
        if !self.relations.is_fresh::<Option<Record<D>>>(decl.name(), &key) {
            let resolved = Gateway::new(store).find_by::<D>(&back_reference(&decl, uid))?;
            self.relations.insert(decl.name(), key, resolved);
        }
        Ok(self
            .relations
            .get_mut::<Option<Record<D>>>(decl.name())
            .and_then(Option::as_mut))
    }

    /// Resolves an inverse one-to-many relationship in creation order.
    /// Use [`Record::related_query`] for another order or a subset.
    pub fn has_many<D: Entity>(
        &mut self,
        store: &Store,
        relation: &HasMany<E, D>,
    ) -> RecordResult<&mut [Record<D>]> {
        let decl = relation.resolve_declaration()?;
        let uid = self.require_uid()?;
        self.check_context(store)?;
        let key = cache_key(store, Some(uid.to_string()));
        if !self.relations.is_fresh::<Vec<Record<D>>>(decl.name(), &key) {
            let resolved =
                Gateway::new(store).scan::<D>(&back_reference(&decl, uid), None, Window::All)?;
            self.relations.insert(decl.name(), key, resolved);
        }
        Ok(self
            .relations
            .get_mut::<Vec<Record<D>>>(decl.name())
            .map(Vec::as_mut_slice)
            .unwrap_or_default())
    }

    /// Query over the dependents of an inverse one-to-many relationship.
    /// Not cached.
    pub fn related_query<D: Entity>(&self, relation: &HasMany<E, D>) -> RecordResult<Query<D>> {
        let decl = relation.resolve_declaration()?;
        let uid = self.require_uid()?;
        Ok(Query::new().filter(back_reference(&decl, uid)))
    }

    /// Points the foreign key of an owning relationship at `target`, or
    /// clears it. Takes effect in the store on the next save.
    pub fn associate<R: Entity>(
        &mut self,
        relation: &BelongsTo<E, R>,
        target: Option<&Record<R>>,
    ) -> RecordResult<()> {
        let decl = relation.resolve_declaration()?;
        let value = match target {
            Some(target) => Value::from(target.require_uid()?),
            None => Value::Null,
        };
        self.set(&decl.foreign_key(), value)
    }
}

fn cache_key(store: &Store, anchor: Option<String>) -> CacheKey {
    CacheKey {
        store: store.id(),
        epoch: store.deletion_epoch(),
        anchor,
    }
}

fn back_reference(decl: &RelationshipDecl, uid: Uuid) -> Predicate {
    Predicate::new().eq(decl.foreign_key(), uid)
}

fn resolve_owner<E: Entity, R: Entity>(
    store: &Store,
    decl: &RelationshipDecl,
    raw: &str,
) -> RecordResult<Option<Record<R>>> {
    let found = match Uuid::parse_str(raw) {
        Ok(uid) => Gateway::new(store).find::<R>(uid)?,
        Err(_) => None,
    };
    if found.is_none() {
        warn!(
            "event=relation_dangling module=repo status=anomaly entity={} relationship={} target={} foreign_key={}",
            E::schema().type_name(),
            decl.name(),
            R::schema().type_name(),
            raw
        );
    }
    Ok(found)
}
