//! Rust models matching the database schema.

use chrono::{DateTime, Utc};
use mediaconv_common::{BatchId, BatchStatus, TaskId};
use serde::{Deserialize, Serialize};

/// Persisted batch record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchRecord {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub task_ids: Vec<TaskId>,
    pub error: Option<String>,
    pub zip_filename: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional fields written alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchUpdate {
    pub task_ids: Option<Vec<TaskId>>,
    pub error: Option<String>,
    pub zip_filename: Option<String>,
}
