//! Cascade delete engine.
//!
//! # Responsibility
//! - Delete a record together with every dependent reachable through
//!   inverse relationship declarations, dependents first.
//!
//! # Invariants
//! - Terminates on cyclic graphs: each `(type, uid)` is visited at most once
//!   per cascade call.
//! - Rows that vanish mid-walk are skipped, not reported.
//! - Each row deletion is its own transaction. A failure aborts the cascade
//!   and is returned; deletions committed before it stay committed.

use crate::db::predicate::Predicate;
use crate::db::Store;
use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::model::schema::{Direction, EntitySchema};
use crate::repo::error::RecordResult;
use crate::repo::gateway::Gateway;
use log::{error, info};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

type Visited = HashSet<(&'static str, Uuid)>;

/// Options for typed destroy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Also destroy dependents reached through inverse relationships.
    pub cascade: bool,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self { cascade: true }
    }
}

impl DestroyOptions {
    pub fn without_cascade() -> Self {
        Self { cascade: false }
    }
}

/// Cascade deletion bound to one store.
#[derive(Debug, Clone, Copy)]
pub struct CascadeEngine<'store> {
    gateway: Gateway<'store>,
}

impl<'store> CascadeEngine<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self {
            gateway: Gateway::new(store),
        }
    }

    /// Destroys `record` (and, with `options.cascade`, its dependents).
    /// Returns whether the record's own row was removed.
    pub fn destroy<E: Entity>(
        &self,
        record: &mut Record<E>,
        options: DestroyOptions,
    ) -> RecordResult<bool> {
        let uid = record.require_uid()?;
        record.check_context(self.gateway.store())?;
        let started_at = Instant::now();
        let mut visited = Visited::new();

        let outcome = self.destroy_typed(record, uid, options, &mut visited);
        let removed = outcome
            .as_ref()
            .map(|(removed, _)| *removed)
            .map_err(|err| err.to_string());
        self.log_outcome(E::schema(), removed, started_at);
        Ok(outcome?.1)
    }

    /// Destroys every record matching `predicate`. Returns the number of rows
    /// removed, dependents included.
    pub fn destroy_where<E: Entity>(
        &self,
        predicate: &Predicate,
        options: DestroyOptions,
    ) -> RecordResult<usize> {
        let schema = E::schema();
        let started_at = Instant::now();
        let outcome = self.destroy_selected::<E>(predicate, options);
        let removed = outcome.as_ref().copied().map_err(|err| err.to_string());
        self.log_outcome(schema, removed, started_at);
        outcome
    }

    pub fn destroy_all<E: Entity>(&self, options: DestroyOptions) -> RecordResult<usize> {
        self.destroy_where::<E>(&Predicate::new(), options)
    }

    fn destroy_selected<E: Entity>(
        &self,
        predicate: &Predicate,
        options: DestroyOptions,
    ) -> RecordResult<usize> {
        let mut visited = Visited::new();
        let mut removed = 0;
        for uid in self.gateway.select_uids(E::schema(), predicate)? {
            if visited.contains(&(E::schema().type_name(), uid)) {
                continue;
            }
            // Already removed as a dependent of an earlier match.
            let Some(mut record) = self.gateway.find::<E>(uid)? else {
                continue;
            };
            removed += self.destroy_typed(&mut record, uid, options, &mut visited)?.0;
        }
        Ok(removed)
    }

    /// Runs destroy callbacks around the untyped walk. Returns the rows
    /// removed and whether the record's own row was among them.
    fn destroy_typed<E: Entity>(
        &self,
        record: &mut Record<E>,
        uid: Uuid,
        options: DestroyOptions,
        visited: &mut Visited,
    ) -> RecordResult<(usize, bool)> {
        let schema = E::schema();
        record.entity.before_destroy();

        visited.insert((schema.type_name(), uid));
        let mut removed = 0;
        if options.cascade {
            removed += self.destroy_dependents(schema, uid, visited)?;
        }
        let own_row = self.gateway.delete_uid(schema, uid)?;

        record.meta.persisted = false;
        record.invalidate_relations();
        if own_row {
            record.entity.after_destroy();
            removed += 1;
        }
        Ok((removed, own_row))
    }

    fn destroy_tree(
        &self,
        schema: &'static EntitySchema,
        uid: Uuid,
        visited: &mut Visited,
    ) -> RecordResult<usize> {
        if !visited.insert((schema.type_name(), uid)) {
            return Ok(0);
        }
        let mut removed = self.destroy_dependents(schema, uid, visited)?;
        if self.gateway.delete_uid(schema, uid)? {
            removed += 1;
        }
        Ok(removed)
    }

    fn destroy_dependents(
        &self,
        schema: &'static EntitySchema,
        uid: Uuid,
        visited: &mut Visited,
    ) -> RecordResult<usize> {
        let mut removed = 0;
        for decl in schema.relationships() {
            if decl.direction() != Direction::Inverse {
                continue;
            }
            let related = decl.related();
            let predicate = Predicate::new().eq(decl.foreign_key(), uid);
            for dependent in self.gateway.select_uids(related, &predicate)? {
                removed += self.destroy_tree(related, dependent, visited)?;
            }
        }
        Ok(removed)
    }

    fn log_outcome(
        &self,
        schema: &EntitySchema,
        outcome: Result<usize, String>,
        started_at: Instant,
    ) {
        match outcome {
            Ok(removed) => info!(
                "event=cascade_destroy module=service status=ok entity={} removed={} duration_ms={}",
                schema.type_name(),
                removed,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=cascade_destroy module=service status=error entity={} duration_ms={} error={}",
                schema.type_name(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
    }
}

impl<E: Entity> Record<E> {
    /// Destroys this record and its dependents. Returns whether this
    /// record's row was removed.
    pub fn destroy(&mut self, store: &Store) -> RecordResult<bool> {
        self.destroy_with(store, DestroyOptions::default())
    }

    pub fn destroy_with(&mut self, store: &Store, options: DestroyOptions) -> RecordResult<bool> {
        CascadeEngine::new(store).destroy(self, options)
    }
}
