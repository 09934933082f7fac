//! Per-entity table synchronization.
//!
//! # Responsibility
//! - Create the table of an entity type on first use.
//! - Append columns for attributes declared after the table was created.
//! - Keep `entity_catalog` in step and reject table-name collisions.
//!
//! # Invariants
//! - Synchronization is additive: columns are never dropped or retyped.
//! - Runs inside one IMMEDIATE transaction so concurrent stores opening the
//!   same file cannot interleave DDL.

use super::{DbError, DbResult};
use crate::model::record::now_millis;
use crate::model::schema::{Direction, EntitySchema, SchemaError};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::time::Instant;

pub(crate) fn sync_entity_table(conn: &Connection, schema: &EntitySchema) -> DbResult<()> {
    let started_at = Instant::now();
    match sync_in_transaction(conn, schema) {
        Ok(added_columns) => {
            info!(
                "event=schema_sync module=db status=ok entity={} table={} added_columns={} duration_ms={}",
                schema.type_name(),
                schema.table_name(),
                added_columns,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=schema_sync module=db status=error entity={} duration_ms={} error={}",
                schema.type_name(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn sync_in_transaction(conn: &Connection, schema: &EntitySchema) -> DbResult<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let table = schema.table_name();

    let existing = tx
        .query_row(
            "SELECT type_name FROM entity_catalog WHERE table_name = ?1;",
            params![table],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match existing {
        Some(owner) if owner != schema.type_name() => {
            return Err(DbError::Schema(SchemaError::TableConflict {
                entity: schema.type_name(),
                table: table.to_string(),
                existing: owner,
            }));
        }
        Some(_) => {}
        None => {
            tx.execute(
                "INSERT INTO entity_catalog (type_name, table_name, registered_at) VALUES (?1, ?2, ?3);",
                params![schema.type_name(), table, now_millis()],
            )?;
        }
    }

    let mut columns = vec![
        "seq INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "uid TEXT NOT NULL UNIQUE".to_string(),
        "created_at INTEGER NOT NULL".to_string(),
        "updated_at INTEGER NOT NULL".to_string(),
    ];
    columns.extend(
        schema
            .attributes()
            .iter()
            .map(|decl| format!("\"{}\" {}", decl.name, decl.kind.sql_type())),
    );
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" ({});",
        columns.join(", ")
    ))?;

    let present = existing_columns(&tx, table)?;
    let mut added_columns = 0;
    for decl in schema.attributes() {
        if present.contains(decl.name) {
            continue;
        }
        tx.execute_batch(&format!(
            "ALTER TABLE \"{table}\" ADD COLUMN \"{}\" {};",
            decl.name,
            decl.kind.sql_type()
        ))?;
        added_columns += 1;
    }

    for decl in schema.relationships() {
        if decl.direction() != Direction::Owning {
            continue;
        }
        let foreign_key = decl.foreign_key();
        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_{foreign_key}\" ON \"{table}\" (\"{foreign_key}\");"
        ))?;
    }

    tx.commit()?;
    Ok(added_columns)
}

fn existing_columns(conn: &Connection, table: &str) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let mut rows = stmt.query([])?;
    let mut names = HashSet::new();
    while let Some(row) = rows.next()? {
        names.insert(row.get::<_, String>(1)?);
    }
    Ok(names)
}
