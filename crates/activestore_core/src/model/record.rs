//! Typed record handles.
//!
//! # Responsibility
//! - Pair a domain entity with its storage metadata (`uid`, timestamps,
//!   persistence state, owning store context).
//! - Own the per-instance relationship cache.
//!
//! # Invariants
//! - `uid` is assigned once and never changes afterwards.
//! - Two records of the same type with the same `uid` denote the same entity.
//! - Relationship caches are never shared between instances, not even
//!   between clones.
//! - A record fetched or saved through one store is only used with that
//!   store; other contexts go through a handoff.

use crate::db::rows::StoredRow;
use crate::db::{Store, StoreId};
use crate::model::entity::{encode_entity, entity_from_attributes, overlay_entity, read_attribute, Entity};
use crate::model::schema::Direction;
use crate::model::value::{Attributes, Value};
use crate::repo::error::{RecordError, RecordResult};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

/// Storage-side state of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMeta {
    pub(crate) uid: Option<Uuid>,
    pub(crate) created_at: Option<i64>,
    pub(crate) updated_at: Option<i64>,
    pub(crate) persisted: bool,
    pub(crate) context: Option<StoreId>,
}

/// Validity stamp of a cached relationship value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheKey {
    pub store: StoreId,
    /// Store deletion epoch at resolution time.
    pub epoch: u64,
    /// Foreign-key value (owning side) or own `uid` (inverse side).
    pub anchor: Option<String>,
}

struct CachedRelation {
    key: CacheKey,
    value: Box<dyn Any>,
}

/// Last resolved value per relationship name.
#[derive(Default)]
pub(crate) struct RelationCache {
    entries: HashMap<&'static str, CachedRelation>,
}

impl RelationCache {
    pub fn is_fresh<T: 'static>(&self, name: &str, key: &CacheKey) -> bool {
        self.entries
            .get(name)
            .is_some_and(|entry| entry.key == *key && entry.value.is::<T>())
    }

    pub fn insert<T: 'static>(&mut self, name: &'static str, key: CacheKey, value: T) {
        self.entries.insert(
            name,
            CachedRelation {
                key,
                value: Box::new(value),
            },
        );
    }

    pub fn get_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .get_mut(name)
            .and_then(|entry| entry.value.downcast_mut::<T>())
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A typed entity plus its storage metadata and relationship cache.
///
/// Dereferences to the entity, so fields are read and assigned directly:
///
/// ```ignore
/// let mut author = Record::new(Author { name: "Alice".into(), age: 28 });
/// author.age += 1;
/// author.save(&store)?;
/// ```
pub struct Record<E: Entity> {
    pub(crate) meta: RecordMeta,
    pub(crate) entity: E,
    pub(crate) relations: RelationCache,
}

impl<E: Entity> Record<E> {
    /// New, unsaved record.
    pub fn new(entity: E) -> Self {
        Self {
            meta: RecordMeta::default(),
            entity,
            relations: RelationCache::default(),
        }
    }

    /// New, unsaved record that will be inserted under `uid`.
    pub fn with_uid(entity: E, uid: Uuid) -> Self {
        let mut record = Self::new(entity);
        record.meta.uid = Some(uid);
        record
    }

    /// New, unsaved record with `attributes` assigned over the defaults.
    pub fn from_attributes(attributes: &Attributes) -> RecordResult<Self> {
        Ok(Self::new(entity_from_attributes(attributes)?))
    }

    pub(crate) fn from_row(row: StoredRow, context: StoreId) -> RecordResult<Self> {
        Ok(Self {
            meta: RecordMeta {
                uid: Some(row.uid),
                created_at: Some(row.created_at),
                updated_at: Some(row.updated_at),
                persisted: true,
                context: Some(context),
            },
            entity: entity_from_attributes(&row.attributes)?,
            relations: RelationCache::default(),
        })
    }

    pub fn uid(&self) -> Option<Uuid> {
        self.meta.uid
    }

    pub fn created_at(&self) -> Option<i64> {
        self.meta.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.meta.updated_at
    }

    pub fn is_persisted(&self) -> bool {
        self.meta.persisted
    }

    pub fn is_new(&self) -> bool {
        !self.meta.persisted
    }

    /// Store the record was last read from or written through.
    pub fn context(&self) -> Option<StoreId> {
        self.meta.context
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> RecordResult<Attributes> {
        encode_entity(&self.entity)
    }

    /// Value of a declared attribute, `uid` or a timestamp.
    pub fn get(&self, name: &str) -> RecordResult<Value> {
        match name {
            "uid" => Ok(self.meta.uid.into()),
            "created_at" => Ok(self.meta.created_at.into()),
            "updated_at" => Ok(self.meta.updated_at.into()),
            _ => read_attribute(&self.entity, name),
        }
    }

    /// Assigns one declared attribute by name.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> RecordResult<()> {
        let mut attributes = Attributes::with_capacity(1);
        attributes.insert(name.to_string(), value.into());
        self.assign(&attributes)
    }

    /// Assigns several declared attributes at once.
    ///
    /// Cached owning relationships keyed by an assigned attribute are dropped.
    pub fn assign(&mut self, attributes: &Attributes) -> RecordResult<()> {
        self.entity = overlay_entity(&self.entity, attributes)?;
        for decl in E::schema().relationships() {
            if decl.direction() == Direction::Owning && attributes.contains_key(&decl.foreign_key()) {
                self.relations.remove(decl.name());
            }
        }
        Ok(())
    }

    /// Same type and same `uid`. Unsaved records are only the same entity
    /// as themselves.
    pub fn is_same_entity(&self, other: &Record<E>) -> bool {
        match (self.meta.uid, other.meta.uid) {
            (Some(left), Some(right)) => left == right,
            _ => std::ptr::eq(self, other),
        }
    }

    /// Drops every cached relationship value.
    pub fn invalidate_relations(&mut self) {
        self.relations.clear();
    }

    pub(crate) fn require_uid(&self) -> RecordResult<Uuid> {
        self.meta.uid.ok_or(RecordError::UnsavedRecord {
            entity: E::schema().type_name(),
        })
    }

    pub(crate) fn check_context(&self, store: &Store) -> RecordResult<()> {
        match self.meta.context {
            Some(owner) if owner != store.id() => Err(RecordError::ContextMismatch {
                entity: E::schema().type_name(),
                owner,
                current: store.id(),
            }),
            _ => Ok(()),
        }
    }
}

impl<E: Entity> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E: Entity> DerefMut for Record<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}

impl<E: Entity + Clone> Clone for Record<E> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            entity: self.entity.clone(),
            relations: RelationCache::default(),
        }
    }
}

impl<E: Entity + Debug> Debug for Record<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("type", &E::schema().type_name())
            .field("meta", &self.meta)
            .field("entity", &self.entity)
            .field("cached_relations", &self.relations.len())
            .finish()
    }
}
