//! Durable batch status.
//!
//! The coordinator only talks to [`PersistenceGateway`]. The SQLite
//! implementation falls back to an in-memory database when the file cannot
//! be opened, so a broken disk costs restart durability, not availability.

use mediaconv_common::{BatchId, BatchStatus, Result, TaskId};
use mediaconv_db::models::{BatchRecord, BatchUpdate};
use mediaconv_db::pool::{get_conn, init_memory_pool, init_pool, DbPool};
use mediaconv_db::queries::batches;
use std::path::Path;

/// Narrow save/update/read contract for batch records.
pub trait PersistenceGateway: Send + Sync {
    /// Record a new batch.
    fn save(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
        task_ids: &[TaskId],
        session_id: Option<&str>,
    ) -> Result<()>;

    /// Move a batch to `status`, writing any fields set in `update`.
    fn update_status(&self, batch_id: BatchId, status: BatchStatus, update: &BatchUpdate) -> Result<()>;

    /// Read a batch; `Ok(None)` when unknown.
    fn read(&self, batch_id: BatchId) -> Result<Option<BatchRecord>>;

    /// Batches in a status, oldest first.
    fn list(&self, status: BatchStatus, limit: usize) -> Result<Vec<BatchRecord>>;

    /// Whether records survive a restart.
    fn is_durable(&self) -> bool;
}

/// SQLite-backed gateway.
#[derive(Clone)]
pub struct SqliteGateway {
    pool: DbPool,
    durable: bool,
}

impl SqliteGateway {
    /// Open the database file, or an in-memory store if that fails.
    pub fn open(path: &Path) -> Result<Self> {
        match init_pool(&path.to_string_lossy()) {
            Ok(pool) => {
                tracing::info!("Batch database at {:?}", path);
                Ok(Self {
                    pool,
                    durable: true,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open batch database {:?}: {}; batch state will not survive restarts",
                    path,
                    e
                );
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            pool: init_memory_pool()?,
            durable: false,
        })
    }
}

impl PersistenceGateway for SqliteGateway {
    fn save(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
        task_ids: &[TaskId],
        session_id: Option<&str>,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        batches::save_batch(&conn, batch_id, status, task_ids, session_id)?;
        Ok(())
    }

    fn update_status(&self, batch_id: BatchId, status: BatchStatus, update: &BatchUpdate) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if !batches::update_batch_status(&conn, batch_id, status, update)? {
            tracing::warn!(batch_id = %batch_id, "Status update for unknown batch");
        }
        Ok(())
    }

    fn read(&self, batch_id: BatchId) -> Result<Option<BatchRecord>> {
        let conn = get_conn(&self.pool)?;
        batches::get_batch(&conn, batch_id)
    }

    fn list(&self, status: BatchStatus, limit: usize) -> Result<Vec<BatchRecord>> {
        let conn = get_conn(&self.pool)?;
        batches::list_batches_by_status(&conn, status, limit)
    }

    fn is_durable(&self) -> bool {
        self.durable
    }
}
