//! Embedded schema migrations.
//!
//! The applied version is kept in SQLite's `user_version` pragma. Each
//! pending step runs in its own transaction together with the version bump.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration {version} ({name}) failed: {source}")]
    Step {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

/// Ordered schema steps; index + 1 is the version.
const STEPS: &[(&str, &str)] = &[("initial", include_str!("001_initial.sql"))];

/// Highest version the embedded steps reach.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

/// Version recorded in the database file.
pub fn current_version(conn: &Connection) -> Result<u32, MigrationError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the schema up to date, returning how many steps ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for (version, &(name, sql)) in (1u32..).zip(STEPS.iter()) {
        if version <= current {
            continue;
        }

        let step = |source| MigrationError::Step {
            version,
            name,
            source,
        };
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(step)?;
        tx.pragma_update(None, "user_version", version).map_err(step)?;
        tx.commit().map_err(step)?;
        applied += 1;
    }

    Ok(applied)
}
