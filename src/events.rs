//! Progress events broadcast to interested listeners.

use mediaconv_common::{BatchId, TaskId};
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle event for a task or batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ConversionEvent {
    TaskStarted {
        task_id: TaskId,
        filename: String,
    },
    TaskProgress {
        task_id: TaskId,
        progress: f64,
    },
    TaskCompleted {
        task_id: TaskId,
        outputs: usize,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },
    BatchCompleted {
        batch_id: BatchId,
        archive: String,
    },
    BatchFailed {
        batch_id: BatchId,
        error: String,
    },
}

impl ConversionEvent {
    /// Task id carried by the event, if it is a task event.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskProgress { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. } => Some(*task_id),
            Self::BatchCompleted { .. } | Self::BatchFailed { .. } => None,
        }
    }
}

/// Cloneable broadcast sender.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ConversionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversionEvent> {
        self.tx.subscribe()
    }

    /// Send an event. Having no subscribers is fine.
    pub fn publish(&self, event: ConversionEvent) {
        let _ = self.tx.send(event);
    }
}
