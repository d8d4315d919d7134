//! Typed ID wrappers for type safety across mediaconv.
//!
//! Newtype wrappers around UUIDs prevent mixing task and batch identifiers.
//! Both render as the hyphenated UUID string, and `short()` yields the first
//! 8 characters used in output filenames and archive entry names.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Number of identifier characters used in derived filenames.
pub const SHORT_ID_LEN: usize = 8;

/// Unique identifier for a conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a new random task ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters of the hyphenated form.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.to_string()[..SHORT_ID_LEN].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TaskId> for Uuid {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a batch (and the archive it produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generate a new random batch ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Archive filename derived from this identifier.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<BatchId> for Uuid {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
