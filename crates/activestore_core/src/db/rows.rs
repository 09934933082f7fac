//! Row-level primitives over entity tables.
//!
//! # Responsibility
//! - Insert, overwrite, delete and scan entity rows by schema.
//! - Answer attribute-only projections and counts without materializing
//!   records.
//!
//! # Invariants
//! - Callers run these against synchronized tables only.
//! - Stored values are decoded through the declared attribute kind; rows that
//!   cannot be decoded are reported, never masked.

use super::predicate::{Predicate, SortOrder};
use super::{DbError, DbResult};
use crate::model::schema::EntitySchema;
use crate::model::value::{AttrKind, Attributes, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

/// One stored entity row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredRow {
    pub uid: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub attributes: Attributes,
}

/// Slice of the ordered match set a scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Window {
    All,
    /// First `n` rows in order.
    Head(usize),
    /// Last `n` rows, still returned in order.
    Tail(usize),
    /// The single row at position `n`.
    Nth(usize),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Scan<'a> {
    pub predicate: &'a Predicate,
    pub order: Option<&'a SortOrder>,
    pub window: Window,
}

impl<'a> Scan<'a> {
    pub fn new(predicate: &'a Predicate) -> Self {
        Self {
            predicate,
            order: None,
            window: Window::All,
        }
    }

    pub fn order(mut self, order: Option<&'a SortOrder>) -> Self {
        self.order = order;
        self
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Renders `WHERE … ORDER BY … LIMIT …` plus parameters. The boolean is
    /// set when rows come back in reverse and must be flipped by the caller.
    fn render(&self, schema: &EntitySchema) -> DbResult<(String, Vec<Value>, bool)> {
        let (filter, mut params) = self.predicate.render(schema)?;
        let reversed = matches!(self.window, Window::Tail(_));
        let order = SortOrder::render(self.order, schema, reversed)?;
        let limit = match self.window {
            Window::All => String::new(),
            Window::Head(count) | Window::Tail(count) => {
                params.push(Value::Integer(clamp_i64(count)));
                format!(" LIMIT ?{}", params.len())
            }
            Window::Nth(index) => {
                params.push(Value::Integer(clamp_i64(index)));
                format!(" LIMIT 1 OFFSET ?{}", params.len())
            }
        };
        Ok((format!("{filter}{order}{limit}"), params, reversed))
    }
}

// SQLite integers are signed 64-bit.
fn clamp_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn insert_row(conn: &Connection, schema: &EntitySchema, row: &StoredRow) -> DbResult<()> {
    let mut columns = vec!["uid".to_string(), "created_at".to_string(), "updated_at".to_string()];
    let mut values = vec![
        Value::from(row.uid),
        Value::Integer(row.created_at),
        Value::Integer(row.updated_at),
    ];
    for decl in schema.attributes() {
        columns.push(format!("\"{}\"", decl.name));
        values.push(row.attributes.get(decl.name).cloned().unwrap_or_default());
    }
    let placeholders = (1..=values.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute(
        &format!(
            "INSERT INTO \"{}\" ({}) VALUES ({placeholders});",
            schema.table_name(),
            columns.join(", ")
        ),
        params_from_iter(values.iter()),
    )?;
    Ok(())
}

/// Overwrites attributes and `updated_at` of the row with `row.uid`.
/// Returns `false` when no such row exists.
pub(crate) fn update_row(conn: &Connection, schema: &EntitySchema, row: &StoredRow) -> DbResult<bool> {
    let mut assignments = vec!["updated_at = ?1".to_string()];
    let mut values = vec![Value::Integer(row.updated_at)];
    for decl in schema.attributes() {
        values.push(row.attributes.get(decl.name).cloned().unwrap_or_default());
        assignments.push(format!("\"{}\" = ?{}", decl.name, values.len()));
    }
    values.push(Value::from(row.uid));

    let changed = conn.execute(
        &format!(
            "UPDATE \"{}\" SET {} WHERE uid = ?{};",
            schema.table_name(),
            assignments.join(", "),
            values.len()
        ),
        params_from_iter(values.iter()),
    )?;
    Ok(changed > 0)
}

/// Returns whether a row was removed.
pub(crate) fn delete_row(conn: &Connection, schema: &EntitySchema, uid: Uuid) -> DbResult<bool> {
    let changed = conn.execute(
        &format!("DELETE FROM \"{}\" WHERE uid = ?1;", schema.table_name()),
        params![uid.to_string()],
    )?;
    Ok(changed > 0)
}

pub(crate) fn scan_rows(conn: &Connection, schema: &EntitySchema, scan: Scan<'_>) -> DbResult<Vec<StoredRow>> {
    let (tail, params, reversed) = scan.render(schema)?;
    let mut columns = vec!["uid", "created_at", "updated_at"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    columns.extend(schema.attributes().iter().map(|decl| format!("\"{}\"", decl.name)));

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM \"{}\"{tail};",
        columns.join(", "),
        schema.table_name()
    ))?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut found = Vec::new();
    while let Some(row) = rows.next()? {
        found.push(parse_stored_row(schema, row)?);
    }

    if reversed {
        found.reverse();
    }
    Ok(found)
}

/// Projects `columns` of every matching row, keyed in the requested order.
pub(crate) fn scan_columns(
    conn: &Connection,
    schema: &EntitySchema,
    columns: &[String],
    scan: Scan<'_>,
) -> DbResult<Vec<Attributes>> {
    let mut kinds = Vec::with_capacity(columns.len());
    for column in columns {
        let kind = schema
            .column_kind(column)
            .ok_or_else(|| DbError::UnknownColumn {
                entity: schema.type_name(),
                column: column.clone(),
            })?;
        kinds.push(kind);
    }
    let (tail, params, reversed) = scan.render(schema)?;
    let select = if columns.is_empty() {
        "uid".to_string()
    } else {
        columns
            .iter()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {select} FROM \"{}\"{tail};",
        schema.table_name()
    ))?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut found = Vec::new();
    while let Some(row) = rows.next()? {
        let mut projected = Attributes::with_capacity(columns.len());
        for (index, (column, kind)) in columns.iter().zip(kinds.iter().copied()).enumerate() {
            projected.insert(column.clone(), read_value(schema, row, index, kind)?);
        }
        found.push(projected);
    }

    if reversed {
        found.reverse();
    }
    Ok(found)
}

pub(crate) fn count_rows(conn: &Connection, schema: &EntitySchema, predicate: &Predicate) -> DbResult<u64> {
    let (filter, params) = predicate.render(schema)?;
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{}\"{filter};", schema.table_name()),
        params_from_iter(params.iter()),
        |row| row.get::<_, i64>(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Matching `uid`s in creation order.
pub(crate) fn select_uids(conn: &Connection, schema: &EntitySchema, predicate: &Predicate) -> DbResult<Vec<Uuid>> {
    let (tail, params, _) = Scan::new(predicate).render(schema)?;
    let mut stmt = conn.prepare(&format!("SELECT uid FROM \"{}\"{tail};", schema.table_name()))?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut uids = Vec::new();
    while let Some(row) = rows.next()? {
        uids.push(parse_uid(schema, &row.get::<_, String>(0)?)?);
    }
    Ok(uids)
}

fn parse_stored_row(schema: &EntitySchema, row: &Row<'_>) -> DbResult<StoredRow> {
    let uid = parse_uid(schema, &row.get::<_, String>(0)?)?;
    let created_at = row.get::<_, i64>(1)?;
    let updated_at = row.get::<_, i64>(2)?;
    let mut attributes = Attributes::with_capacity(schema.attributes().len());
    for (offset, decl) in schema.attributes().iter().enumerate() {
        attributes.insert(
            decl.name.to_string(),
            read_value(schema, row, offset + 3, decl.kind)?,
        );
    }

    Ok(StoredRow {
        uid,
        created_at,
        updated_at,
        attributes,
    })
}

fn read_value(schema: &EntitySchema, row: &Row<'_>, index: usize, kind: AttrKind) -> DbResult<Value> {
    Value::from_sql(row.get_ref(index)?, kind).map_err(|message| DbError::InvalidData {
        table: schema.table_name().to_string(),
        message,
    })
}

fn parse_uid(schema: &EntitySchema, raw: &str) -> DbResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| DbError::InvalidData {
        table: schema.table_name().to_string(),
        message: format!("invalid uid `{raw}`: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{count_rows, delete_row, insert_row, scan_columns, scan_rows, update_row, Scan, StoredRow, Window};
    use crate::db::predicate::{Predicate, SortOrder};
    use crate::db::schema_sync::sync_entity_table;
    use crate::model::schema::EntitySchema;
    use crate::model::value::{AttrKind, Value};
    use rusqlite::Connection;
    use uuid::Uuid;

    fn setup() -> (Connection, EntitySchema) {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::apply_migrations(&mut conn).unwrap();
        let schema = EntitySchema::builder("Score")
            .attribute("player", AttrKind::Text)
            .attribute("points", AttrKind::Integer)
            .build();
        sync_entity_table(&conn, &schema).unwrap();
        (conn, schema)
    }

    fn row(player: &str, points: i64, at: i64) -> StoredRow {
        StoredRow {
            uid: Uuid::new_v4(),
            created_at: at,
            updated_at: at,
            attributes: crate::attributes! { "player" => player, "points" => points },
        }
    }

    fn players(rows: &[StoredRow]) -> Vec<String> {
        rows.iter()
            .map(|row| row.attributes["player"].as_text().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn windows_slice_the_ordered_match_set() {
        let (conn, schema) = setup();
        for (index, (player, points)) in [("a", 10), ("b", 30), ("c", 20), ("d", 30)].iter().enumerate() {
            insert_row(&conn, &schema, &row(player, *points, index as i64)).unwrap();
        }
        let all = Predicate::new();
        let by_points = SortOrder::descending("points");

        let head = scan_rows(&conn, &schema, Scan::new(&all).order(Some(&by_points)).window(Window::Head(2))).unwrap();
        assert_eq!(players(&head), vec!["b", "d"]);

        let tail = scan_rows(&conn, &schema, Scan::new(&all).order(Some(&by_points)).window(Window::Tail(2))).unwrap();
        assert_eq!(players(&tail), vec!["c", "a"]);

        let nth = scan_rows(&conn, &schema, Scan::new(&all).window(Window::Nth(2))).unwrap();
        assert_eq!(players(&nth), vec!["c"]);
    }

    #[test]
    fn oversized_windows_clamp_instead_of_failing() {
        let (conn, schema) = setup();
        for (index, player) in ["a", "b"].iter().enumerate() {
            insert_row(&conn, &schema, &row(player, 1, index as i64)).unwrap();
        }
        let all = Predicate::new();
        let head = scan_rows(&conn, &schema, Scan::new(&all).window(Window::Head(usize::MAX))).unwrap();
        assert_eq!(players(&head), vec!["a", "b"]);
        let tail = scan_rows(&conn, &schema, Scan::new(&all).window(Window::Tail(usize::MAX))).unwrap();
        assert_eq!(players(&tail), vec!["a", "b"]);
        let nth = scan_rows(&conn, &schema, Scan::new(&all).window(Window::Nth(usize::MAX))).unwrap();
        assert!(nth.is_empty());
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let (conn, schema) = setup();
        let mut stored = row("a", 1, 1);
        assert!(!update_row(&conn, &schema, &stored).unwrap());
        insert_row(&conn, &schema, &stored).unwrap();
        stored.attributes.insert("points".to_string(), Value::Integer(5));
        stored.updated_at = 2;
        assert!(update_row(&conn, &schema, &stored).unwrap());

        let found = scan_rows(&conn, &schema, Scan::new(&Predicate::new())).unwrap();
        assert_eq!(found, vec![stored.clone()]);

        assert!(delete_row(&conn, &schema, stored.uid).unwrap());
        assert!(!delete_row(&conn, &schema, stored.uid).unwrap());
        assert_eq!(count_rows(&conn, &schema, &Predicate::new()).unwrap(), 0);
    }

    #[test]
    fn projections_follow_requested_columns() {
        let (conn, schema) = setup();
        insert_row(&conn, &schema, &row("a", 7, 1)).unwrap();
        let columns = vec!["points".to_string(), "player".to_string()];
        let projected = scan_columns(&conn, &schema, &columns, Scan::new(&Predicate::new())).unwrap();
        let keys: Vec<&str> = projected[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["points", "player"]);
        assert_eq!(projected[0]["points"], Value::Integer(7));
    }
}
