//! Concurrent task store.
//!
//! The registry hands out one [`TaskHandle`] per created task. The handle is
//! not `Clone`, so the worker holding it is the only writer for that task;
//! everybody else sees snapshots through [`TaskRegistry::get`]. When the
//! registry has an [`EventBus`], every transition is also published.

use dashmap::DashMap;
use mediaconv_common::{MediaKind, TaskId, TaskStatus};
use std::sync::Arc;

use super::task::{Task, TaskOutput};
use crate::events::{ConversionEvent, EventBus};

/// Thread-safe map of task id to task record.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<TaskId, Task>>,
    events: Option<EventBus>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that publishes task transitions on `events`.
    pub fn with_events(events: EventBus) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            events: Some(events),
        }
    }

    /// Insert a fresh `pending` task and return its owner handle.
    pub fn create(&self, filename: impl Into<String>, media_kind: MediaKind) -> TaskHandle {
        self.register(Task::new(filename, media_kind))
    }

    /// Insert an already-built task (used for synthetic failures).
    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    fn register(&self, task: Task) -> TaskHandle {
        let id = task.id;
        self.tasks.insert(id, task);
        TaskHandle {
            id,
            tasks: Arc::clone(&self.tasks),
            events: self.events.clone(),
        }
    }

    /// Snapshot of a task; `None` when the id is unknown.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).map(|t| t.clone())
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Snapshots of every task, oldest first.
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|t| t.value().clone()).collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Exclusive write access to one task in the registry.
pub struct TaskHandle {
    id: TaskId,
    tasks: Arc<DashMap<TaskId, Task>>,
    events: Option<EventBus>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Apply `f` unless the task is already terminal; returns whether it ran.
    fn update<F: FnOnce(&mut Task)>(&self, f: F) -> bool {
        match self.tasks.get_mut(&self.id) {
            Some(mut task) if !task.status.is_terminal() => {
                f(&mut task);
                true
            }
            _ => false,
        }
    }

    fn publish(&self, event: ConversionEvent) {
        if let Some(ref events) = self.events {
            events.publish(event);
        }
    }

    pub fn set_input_size(&self, size: Option<u64>) {
        self.update(|t| t.input_size = size);
    }

    /// `pending -> converting`
    pub fn start(&self) {
        let mut filename = String::new();
        let started = self.update(|t| {
            t.status = TaskStatus::Converting;
            t.progress = 0.0;
            filename = t.filename.clone();
        });
        if started {
            self.publish(ConversionEvent::TaskStarted {
                task_id: self.id,
                filename,
            });
        }
    }

    pub fn progress(&self, progress: f64) {
        let mut current = 0.0;
        if self.update(|t| {
            t.advance(progress);
            current = t.progress;
        }) {
            self.publish(ConversionEvent::TaskProgress {
                task_id: self.id,
                progress: current,
            });
        }
    }

    pub fn record_output(&self, output: TaskOutput) {
        self.update(|t| t.outputs.push(output));
    }

    /// `converting -> completed`, progress pinned at 100.
    pub fn complete(&self) {
        let mut outputs = 0;
        if self.update(|t| {
            t.status = TaskStatus::Completed;
            t.progress = 100.0;
            outputs = t.outputs.len();
        }) {
            self.publish(ConversionEvent::TaskCompleted {
                task_id: self.id,
                outputs,
            });
        }
    }

    /// `converting -> failed`; outputs already written are kept.
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        let message = error.clone();
        if self.update(|t| {
            t.status = TaskStatus::Failed;
            t.error = Some(message);
        }) {
            self.publish(ConversionEvent::TaskFailed {
                task_id: self.id,
                error,
            });
        }
    }

    pub fn snapshot(&self) -> Option<Task> {
        self.tasks.get(&self.id).map(|t| t.clone())
    }
}
