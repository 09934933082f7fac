//! Persistence gateway: record lifecycle over one store.
//!
//! # Responsibility
//! - Save (insert or overwrite), find and delete single records.
//! - Provide full and filtered scans for the query builder and services.
//!
//! # Invariants
//! - `save` validates before mutating and writes the whole row atomically.
//! - `uid` and `created_at` are assigned on the first successful insert only.
//! - A failed save leaves both the store and the record metadata untouched.

use crate::db::predicate::{Predicate, SortOrder};
use crate::db::rows::{self, Scan, StoredRow, Window};
use crate::db::Store;
use crate::model::entity::{encode_entity, Entity};
use crate::model::record::{now_millis, Record};
use crate::model::schema::EntitySchema;
use crate::model::value::Attributes;
use crate::repo::error::{RecordError, RecordResult};
use log::{debug, error, info};
use std::time::Instant;
use uuid::Uuid;

/// Options for [`Gateway::save_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Refresh `updated_at` when overwriting a persisted record.
    pub touch_updated_at: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            touch_updated_at: true,
        }
    }
}

impl SaveOptions {
    /// Keeps the stored `updated_at` of a persisted record.
    pub fn skip_timestamp() -> Self {
        Self {
            touch_updated_at: false,
        }
    }
}

/// Record lifecycle operations bound to one store.
#[derive(Debug, Clone, Copy)]
pub struct Gateway<'store> {
    store: &'store Store,
}

impl<'store> Gateway<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'store Store {
        self.store
    }

    pub fn save<E: Entity>(&self, record: &mut Record<E>) -> RecordResult<()> {
        self.save_with(record, SaveOptions::default())
    }

    /// Inserts a new record or overwrites a persisted one.
    ///
    /// A persisted record whose row was deleted meanwhile is inserted again
    /// under its `uid` and original `created_at`.
    ///
    /// # Errors
    /// - [`RecordError::Validation`] when [`Entity::validate`] rejects the
    ///   record, checked again after the before-callbacks; nothing is written.
    /// - [`RecordError::ContextMismatch`] for records of another store.
    /// - [`RecordError::Store`] when the write cannot be committed.
    pub fn save_with<E: Entity>(
        &self,
        record: &mut Record<E>,
        options: SaveOptions,
    ) -> RecordResult<()> {
        let schema = E::schema();
        self.store.register(schema)?;
        record.check_context(self.store)?;
        record.entity.validate()?;

        let creating = !record.meta.persisted;
        record.entity.before_save();
        if creating {
            record.entity.before_create();
        } else {
            record.entity.before_update();
        }
        record.entity.validate()?;

        let started_at = Instant::now();
        let now = now_millis();
        let uid = record.meta.uid.unwrap_or_else(Uuid::new_v4);
        let created_at = record.meta.created_at.filter(|_| !creating).unwrap_or(now);
        let updated_at = match record.meta.updated_at {
            Some(previous) if !creating && !options.touch_updated_at => previous,
            _ => now,
        };
        let row = StoredRow {
            uid,
            created_at,
            updated_at,
            attributes: encode_entity(&record.entity)?,
        };

        let written = self.store.write(|tx| -> RecordResult<bool> {
            if creating {
                rows::insert_row(tx, schema, &row)?;
                return Ok(true);
            }
            if rows::update_row(tx, schema, &row)? {
                return Ok(false);
            }
            rows::insert_row(tx, schema, &row)?;
            Ok(true)
        });
        let inserted = match written {
            Ok(inserted) => inserted,
            Err(err) => {
                error!(
                    "event=record_save module=repo status=error entity={} uid={} duration_ms={} error={}",
                    schema.type_name(),
                    uid,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        record.meta.uid = Some(uid);
        record.meta.created_at = Some(created_at);
        record.meta.updated_at = Some(updated_at);
        record.meta.persisted = true;
        record.meta.context = Some(self.store.id());

        if creating {
            record.entity.after_create();
        } else {
            record.entity.after_update();
        }
        record.entity.after_save();

        info!(
            "event=record_save module=repo status=ok entity={} uid={} op={} duration_ms={}",
            schema.type_name(),
            uid,
            if inserted { "insert" } else { "update" },
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn find<E: Entity>(&self, uid: Uuid) -> RecordResult<Option<Record<E>>> {
        self.find_by(&Predicate::new().eq("uid", uid))
    }

    /// First match in creation order.
    pub fn find_by<E: Entity>(&self, predicate: &Predicate) -> RecordResult<Option<Record<E>>> {
        Ok(self.scan(predicate, None, Window::Head(1))?.into_iter().next())
    }

    /// Last match in creation order.
    pub fn find_last_by<E: Entity>(&self, predicate: &Predicate) -> RecordResult<Option<Record<E>>> {
        Ok(self.scan(predicate, None, Window::Tail(1))?.into_iter().next())
    }

    /// Existing match for `attributes`, or a new unsaved record carrying them.
    pub fn find_or_initialize<E: Entity>(
        &self,
        attributes: &Attributes,
    ) -> RecordResult<Record<E>> {
        match self.find_by(&Predicate::from_attributes(attributes))? {
            Some(found) => Ok(found),
            None => Record::from_attributes(attributes),
        }
    }

    /// Like [`Gateway::find_or_initialize`], saving a new record right away.
    ///
    /// A validation failure is not an error here: the record comes back
    /// unsaved and callers check [`Record::is_persisted`].
    pub fn find_or_create<E: Entity>(&self, attributes: &Attributes) -> RecordResult<Record<E>> {
        let mut record = self.find_or_initialize::<E>(attributes)?;
        if record.is_persisted() {
            return Ok(record);
        }
        match self.save(&mut record) {
            Ok(()) => Ok(record),
            Err(RecordError::Validation(reason)) => {
                debug!(
                    "event=record_save module=repo status=rejected entity={} reason={}",
                    E::schema().type_name(),
                    reason
                );
                Ok(record)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes exactly the record's row, without touching dependents.
    /// Returns whether a row was removed.
    pub fn delete<E: Entity>(&self, record: &mut Record<E>) -> RecordResult<bool> {
        let uid = record.require_uid()?;
        record.check_context(self.store)?;
        let removed = self.delete_uid(E::schema(), uid)?;
        record.meta.persisted = false;
        record.invalidate_relations();
        Ok(removed)
    }

    pub(crate) fn delete_uid(
        &self,
        schema: &'static EntitySchema,
        uid: Uuid,
    ) -> RecordResult<bool> {
        self.store.register(schema)?;
        let removed = self.store.delete_row(schema, uid)?;
        debug!(
            "event=record_destroy module=repo status=ok entity={} uid={} removed={}",
            schema.type_name(),
            uid,
            removed
        );
        Ok(removed)
    }

    /// Every record in creation order.
    pub fn all<E: Entity>(&self) -> RecordResult<Vec<Record<E>>> {
        self.scan(&Predicate::new(), None, Window::All)
    }

    /// Every record ordered by `attribute`, ties in creation order.
    pub fn all_ordered<E: Entity>(
        &self,
        attribute: &str,
        ascending: bool,
    ) -> RecordResult<Vec<Record<E>>> {
        self.scan(
            &Predicate::new(),
            Some(&SortOrder::new(attribute, ascending)),
            Window::All,
        )
    }

    pub fn count<E: Entity>(&self, predicate: &Predicate) -> RecordResult<u64> {
        let schema = E::schema();
        self.store.register(schema)?;
        Ok(rows::count_rows(self.store.connection(), schema, predicate)?)
    }

    pub(crate) fn scan<E: Entity>(
        &self,
        predicate: &Predicate,
        order: Option<&SortOrder>,
        window: Window,
    ) -> RecordResult<Vec<Record<E>>> {
        let schema = E::schema();
        self.store.register(schema)?;
        let found = rows::scan_rows(
            self.store.connection(),
            schema,
            Scan::new(predicate).order(order).window(window),
        )?;
        found
            .into_iter()
            .map(|row| Record::from_row(row, self.store.id()))
            .collect()
    }

    pub(crate) fn pluck_rows<E: Entity>(
        &self,
        columns: &[String],
        predicate: &Predicate,
        order: Option<&SortOrder>,
        window: Window,
    ) -> RecordResult<Vec<Attributes>> {
        let schema = E::schema();
        self.store.register(schema)?;
        Ok(rows::scan_columns(
            self.store.connection(),
            schema,
            columns,
            Scan::new(predicate).order(order).window(window),
        )?)
    }

    pub(crate) fn select_uids(
        &self,
        schema: &'static EntitySchema,
        predicate: &Predicate,
    ) -> RecordResult<Vec<Uuid>> {
        self.store.register(schema)?;
        Ok(rows::select_uids(self.store.connection(), schema, predicate)?)
    }
}

impl<E: Entity> Record<E> {
    /// Saves through `store`. See [`Gateway::save_with`].
    pub fn save(&mut self, store: &Store) -> RecordResult<()> {
        Gateway::new(store).save(self)
    }

    pub fn save_with(&mut self, store: &Store, options: SaveOptions) -> RecordResult<()> {
        Gateway::new(store).save_with(self, options)
    }

    /// Re-reads attributes and timestamps from `store` and drops cached
    /// relationships. Returns `false` when the row no longer exists; the
    /// record is then marked unsaved.
    pub fn reload(&mut self, store: &Store) -> RecordResult<bool> {
        let uid = self.require_uid()?;
        self.check_context(store)?;
        self.invalidate_relations();
        match Gateway::new(store).find::<E>(uid)? {
            Some(fresh) => {
                self.meta = fresh.meta;
                self.entity = fresh.entity;
                Ok(true)
            }
            None => {
                self.meta.persisted = false;
                Ok(false)
            }
        }
    }
}
