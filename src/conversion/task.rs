//! Task record.

use chrono::{DateTime, Utc};
use mediaconv_common::{MediaKind, OutputFormat, TaskId, TaskStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One output file written for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutput {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Bytes on disk right after writing.
    pub size: u64,
}

/// One source file's conversion.
///
/// Outputs are stored as a single list of [`TaskOutput`], so paths, formats
/// and sizes always have the same length and order.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub filename: String,
    pub media_kind: MediaKind,
    pub status: TaskStatus,
    /// 0..=100
    pub progress: f64,
    /// Set only when `status == Failed`.
    pub error: Option<String>,
    pub outputs: Vec<TaskOutput>,
    pub input_size: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(filename: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            id: TaskId::new(),
            filename: filename.into(),
            media_kind,
            status: TaskStatus::Pending,
            progress: 0.0,
            error: None,
            outputs: Vec::new(),
            input_size: None,
            created_at: Utc::now(),
        }
    }

    /// A task that failed before any conversion work ran.
    pub fn failed(filename: impl Into<String>, media_kind: MediaKind, error: impl Into<String>) -> Self {
        let mut task = Self::new(filename, media_kind);
        task.status = TaskStatus::Failed;
        task.error = Some(error.into());
        task
    }

    pub fn output_paths(&self) -> Vec<&Path> {
        self.outputs.iter().map(|o| o.path.as_path()).collect()
    }

    pub fn output_formats(&self) -> Vec<OutputFormat> {
        self.outputs.iter().map(|o| o.format).collect()
    }

    pub fn output_sizes(&self) -> Vec<u64> {
        self.outputs.iter().map(|o| o.size).collect()
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    pub fn total_output_size(&self) -> u64 {
        self.outputs.iter().map(|o| o.size).sum()
    }

    /// Raise progress; lower values are ignored so polling never sees it go back.
    pub(crate) fn advance(&mut self, progress: f64) {
        let clamped = progress.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("photo.jpg", MediaKind::Image);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.error.is_none());
        assert!(!task.has_outputs());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut task = Task::new("photo.jpg", MediaKind::Image);
        task.advance(40.0);
        task.advance(20.0);
        assert_eq!(task.progress, 40.0);
        task.advance(250.0);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn test_parallel_accessors() {
        let mut task = Task::new("clip.mov", MediaKind::Video);
        task.outputs.push(TaskOutput {
            path: PathBuf::from("/out/a.mp4"),
            format: OutputFormat::Mp4,
            size: 10,
        });
        task.outputs.push(TaskOutput {
            path: PathBuf::from("/out/a.webm"),
            format: OutputFormat::Webm,
            size: 5,
        });
        assert_eq!(task.output_paths().len(), 2);
        assert_eq!(task.output_formats(), vec![OutputFormat::Mp4, OutputFormat::Webm]);
        assert_eq!(task.output_sizes(), vec![10, 5]);
        assert_eq!(task.total_output_size(), 15);
    }

    #[test]
    fn test_failed_constructor() {
        let task = Task::failed("x.png", MediaKind::Image, "boom");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }
}
