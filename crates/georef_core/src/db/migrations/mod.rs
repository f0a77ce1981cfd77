//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register the store and index schema migrations in increasing order.
//! - Apply pending migrations of one set atomically.
//!
//! # Invariants
//! - `version` values inside a set must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

/// Ordered list of migrations for one database.
#[derive(Debug)]
pub struct MigrationSet {
    pub name: &'static str,
    migrations: &'static [Migration],
}

impl MigrationSet {
    /// Returns the latest migration version known by this binary.
    pub fn latest_version(&self) -> u32 {
        self.migrations
            .last()
            .map_or(0, |migration| migration.version)
    }
}

/// Relational entity tables plus the drift ledger.
pub static STORE_MIGRATIONS: MigrationSet = MigrationSet {
    name: "store",
    migrations: &[
        Migration {
            version: 1,
            sql: include_str!("store/0001_entities.sql"),
        },
        Migration {
            version: 2,
            sql: include_str!("store/0002_drift_ledger.sql"),
        },
    ],
};

/// Projection documents and their FTS5 shadow table.
pub static INDEX_MIGRATIONS: MigrationSet = MigrationSet {
    name: "index",
    migrations: &[Migration {
        version: 1,
        sql: include_str!("index/0001_documents.sql"),
    }],
};

/// Applies all pending migrations of `set` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, set: &MigrationSet) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = set.latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            schema: set.name,
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in set.migrations {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads the schema version recorded on `conn`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
