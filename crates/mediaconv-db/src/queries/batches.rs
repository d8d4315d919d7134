//! Batch record query operations.
//!
//! A batch row is written once when the batch is accepted and updated once
//! more when it reaches a terminal state.

use chrono::{DateTime, Utc};
use mediaconv_common::{BatchId, BatchStatus, Error, Result, TaskId};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{BatchRecord, BatchUpdate};

const BATCH_COLUMNS: &str =
    "batch_id, status, task_ids_json, error, zip_filename, session_id, created_at, updated_at";

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_batch(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    let batch_id = row
        .get::<_, String>(0)?
        .parse::<BatchId>()
        .map_err(|e| conversion_error(0, e))?;
    let status = row
        .get::<_, String>(1)?
        .parse::<BatchStatus>()
        .map_err(|e| conversion_error(1, e))?;
    let task_ids: Vec<TaskId> =
        serde_json::from_str(&row.get::<_, String>(2)?).map_err(|e| conversion_error(2, e))?;

    Ok(BatchRecord {
        batch_id,
        status,
        task_ids,
        error: row.get(3)?,
        zip_filename: row.get(4)?,
        session_id: row.get(5)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?),
        updated_at: parse_timestamp(&row.get::<_, String>(7)?),
    })
}

fn task_ids_json(task_ids: &[TaskId]) -> Result<String> {
    serde_json::to_string(task_ids).map_err(|e| Error::database(e.to_string()))
}

/// Insert a batch record, replacing any existing row with the same id.
pub fn save_batch(
    conn: &Connection,
    batch_id: BatchId,
    status: BatchStatus,
    task_ids: &[TaskId],
    session_id: Option<&str>,
) -> Result<BatchRecord> {
    let now = Utc::now();

    conn.execute(
        "INSERT OR REPLACE INTO batches
             (batch_id, status, task_ids_json, error, zip_filename, session_id, created_at, updated_at)
         VALUES (?, ?, ?, NULL, NULL, ?, ?, ?)",
        params![
            batch_id.to_string(),
            status.to_string(),
            task_ids_json(task_ids)?,
            session_id,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(BatchRecord {
        batch_id,
        status,
        task_ids: task_ids.to_vec(),
        error: None,
        zip_filename: None,
        session_id: session_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    })
}

/// Update a batch's status along with any provided fields.
///
/// Fields left as `None` in `update` keep their stored value. Returns false
/// when no row matched.
pub fn update_batch_status(
    conn: &Connection,
    batch_id: BatchId,
    status: BatchStatus,
    update: &BatchUpdate,
) -> Result<bool> {
    let task_ids = update
        .task_ids
        .as_deref()
        .map(task_ids_json)
        .transpose()?;

    let rows = conn
        .execute(
            "UPDATE batches
             SET status = ?,
                 task_ids_json = COALESCE(?, task_ids_json),
                 error = COALESCE(?, error),
                 zip_filename = COALESCE(?, zip_filename),
                 updated_at = ?
             WHERE batch_id = ?",
            params![
                status.to_string(),
                task_ids,
                update.error,
                update.zip_filename,
                Utc::now().to_rfc3339(),
                batch_id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Get a batch by ID.
pub fn get_batch(conn: &Connection, batch_id: BatchId) -> Result<Option<BatchRecord>> {
    conn.query_row(
        &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?"),
        [batch_id.to_string()],
        row_to_batch,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List batches in a given status, oldest first.
pub fn list_batches_by_status(
    conn: &Connection,
    status: BatchStatus,
    limit: usize,
) -> Result<Vec<BatchRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches
             WHERE status = ?
             ORDER BY created_at ASC
             LIMIT ?"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let batches = stmt
        .query_map(params![status.to_string(), limit as i64], row_to_batch)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(batches)
}
