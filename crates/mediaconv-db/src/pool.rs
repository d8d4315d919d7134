//! r2d2 pools over SQLite, migrated on creation.

use mediaconv_common::{Error, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 4;

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;";

fn migrated(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = get_conn(&pool)?;
    let applied = migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;
    drop(conn);
    if applied > 0 {
        tracing::debug!("Applied {} schema migrations", applied);
    }

    Ok(pool)
}

/// Open (creating if needed) the database file at `db_path`.
///
/// ```no_run
/// let pool = mediaconv_db::pool::init_pool("./data/mediaconv.db").unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    match Path::new(db_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
        _ => {}
    }

    let manager =
        SqliteConnectionManager::file(db_path).with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    migrated(manager, POOL_SIZE)
}

/// A throwaway in-memory database.
///
/// Every in-memory connection is a separate database, so this pool has
/// exactly one connection.
pub fn init_memory_pool() -> Result<DbPool> {
    migrated(SqliteConnectionManager::memory(), 1)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
