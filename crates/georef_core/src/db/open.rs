//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory connections for the store and the index.
//! - Configure connection pragmas and trigger the matching migration set.
//!
//! # Invariants
//! - Returned connections have their migration set fully applied.
//! - No foreign-key constraints are declared and the `foreign_keys` pragma is
//!   left off; parent references are checked by the sync service.

use super::migrations::{apply_migrations, MigrationSet, INDEX_MIGRATIONS, STORE_MIGRATIONS};
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum OpenTarget<'a> {
    File(&'a Path),
    Memory,
}

impl OpenTarget<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens the entity store database file and applies pending store migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_connection(OpenTarget::File(path.as_ref()), &STORE_MIGRATIONS)
}

/// Opens an in-memory entity store with all store migrations applied.
pub fn open_store_db_in_memory() -> DbResult<Connection> {
    open_connection(OpenTarget::Memory, &STORE_MIGRATIONS)
}

/// Opens the search index database file and applies pending index migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_index_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_connection(OpenTarget::File(path.as_ref()), &INDEX_MIGRATIONS)
}

/// Opens an in-memory search index with all index migrations applied.
pub fn open_index_db_in_memory() -> DbResult<Connection> {
    open_connection(OpenTarget::Memory, &INDEX_MIGRATIONS)
}

fn open_connection(target: OpenTarget<'_>, set: &MigrationSet) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!(
        "event=db_open module=db status=start schema={} mode={mode}",
        set.name
    );

    let opened = match target {
        OpenTarget::File(path) => Connection::open(path),
        OpenTarget::Memory => Connection::open_in_memory(),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error schema={} mode={mode} duration_ms={} error_code=db_open_failed error={}",
                set.name,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, set) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok schema={} mode={mode} duration_ms={}",
                set.name,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error schema={} mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                set.name,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, set: &MigrationSet) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn, set)?;
    Ok(())
}
