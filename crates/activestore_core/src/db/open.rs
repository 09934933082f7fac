//! Connection bootstrap for store configurations.
//!
//! # Responsibility
//! - Open file or named in-memory SQLite connections.
//! - Configure connection pragmas required by the store.
//! - Trigger catalog migrations before returning a usable connection.
//!
//! # Invariants
//! - File connections run in WAL mode so readers never block the writer.
//! - Memory connections share one `memdb` database per name; lock
//!   conflicts wait on the busy timeout like file connections do.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::{StoreConfig, StoreLocation};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::time::Instant;

/// Opens a connection for `config` and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = mode_label(&config.location);
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match &config.location {
        StoreLocation::File(path) => Connection::open(path),
        StoreLocation::Memory { name } => Connection::open_with_flags(
            format!("file:/{name}?vfs=memdb"),
            OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
        ),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, config: &StoreConfig) -> DbResult<()> {
    conn.busy_timeout(config.busy_timeout())?;
    if matches!(config.location, StoreLocation::File(_)) {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    apply_migrations(conn)?;
    Ok(())
}

fn mode_label(location: &StoreLocation) -> &'static str {
    match location {
        StoreLocation::File(_) => "file",
        StoreLocation::Memory { .. } => "memory",
    }
}
