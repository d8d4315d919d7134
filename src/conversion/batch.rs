//! Batch fan-out and archive production.
//!
//! A batch converts every supported source concurrently (bounded by the
//! engine's worker pool), collects tasks as they finish, zips whatever was
//! produced and records the outcome. Source files are always deleted once
//! the batch resolves.

use anyhow::Result;
use dashmap::DashMap;
use mediaconv_common::{BatchId, BatchStatus, Error, FolderStructure, MediaKind, TaskId};
use mediaconv_db::models::{BatchRecord, BatchUpdate};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use super::engine::{cleanup_upload, ConversionEngine};
use super::options::ConversionOptions;
use super::task::Task;
use crate::archive::{ArchiveAssembler, ArchiveMember};
use crate::events::{ConversionEvent, EventBus};
use crate::persistence::PersistenceGateway;

/// Error recorded when no task produced a file.
pub const NO_OUTPUTS_ERROR: &str = "No outputs produced";

/// In-memory view of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchJob {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub task_ids: Vec<TaskId>,
    /// Set only when `status == Failed`.
    pub error: Option<String>,
    /// Set only when `status == Completed`.
    pub zip_filename: Option<String>,
}

impl BatchJob {
    fn processing(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Processing,
            task_ids: Vec::new(),
            error: None,
            zip_filename: None,
        }
    }
}

impl From<BatchRecord> for BatchJob {
    fn from(record: BatchRecord) -> Self {
        Self {
            batch_id: record.batch_id,
            status: record.status,
            task_ids: record.task_ids,
            error: record.error,
            zip_filename: record.zip_filename,
        }
    }
}

/// One file of a batch.
#[derive(Debug, Clone)]
pub struct BatchSource {
    pub path: PathBuf,
    /// Name used for the `by_file` archive folder; defaults to the file name.
    pub display_name: Option<String>,
}

impl From<PathBuf> for BatchSource {
    fn from(path: PathBuf) -> Self {
        Self {
            path,
            display_name: None,
        }
    }
}

/// Everything needed to run a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub batch_id: BatchId,
    pub sources: Vec<BatchSource>,
    pub options: ConversionOptions,
    pub layout: FolderStructure,
    pub session_id: Option<String>,
}

impl BatchRequest {
    pub fn new(sources: Vec<BatchSource>, options: ConversionOptions) -> Self {
        Self {
            batch_id: BatchId::new(),
            sources,
            options,
            layout: FolderStructure::Flat,
            session_id: None,
        }
    }

    pub fn with_batch_id(mut self, batch_id: BatchId) -> Self {
        self.batch_id = batch_id;
        self
    }

    pub fn with_layout(mut self, layout: FolderStructure) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Runs batches and answers status queries for them.
#[derive(Clone)]
pub struct BatchCoordinator {
    engine: ConversionEngine,
    archiver: ArchiveAssembler,
    gateway: Arc<dyn PersistenceGateway>,
    events: EventBus,
    jobs: Arc<DashMap<BatchId, BatchJob>>,
    background: Arc<Mutex<JoinSet<()>>>,
}

fn reap_finished(background: &mut JoinSet<()>) {
    while let Some(result) = background.try_join_next() {
        if let Err(e) = result {
            tracing::error!("Background batch aborted: {}", e);
        }
    }
}

impl BatchCoordinator {
    pub fn new(
        engine: ConversionEngine,
        archiver: ArchiveAssembler,
        gateway: Arc<dyn PersistenceGateway>,
        events: EventBus,
    ) -> Self {
        Self {
            engine,
            archiver,
            gateway,
            events,
            jobs: Arc::new(DashMap::new()),
            background: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    /// Record the batch as `processing`.
    fn create(&self, request: &BatchRequest) -> BatchJob {
        let job = BatchJob::processing(request.batch_id);
        self.jobs.insert(job.batch_id, job.clone());

        if let Err(e) = self.gateway.save(
            job.batch_id,
            BatchStatus::Processing,
            &[],
            request.session_id.as_deref(),
        ) {
            tracing::warn!(batch_id = %job.batch_id, "Failed to persist new batch: {}", e);
        }
        tracing::info!(
            batch_id = %job.batch_id,
            "Batch accepted with {} files",
            request.sources.len()
        );
        job
    }

    /// Run a batch to completion and return its final state.
    pub async fn run(&self, request: BatchRequest) -> BatchJob {
        self.create(&request);
        self.process(request).await
    }

    /// Accept a batch and process it in the background.
    pub fn submit(&self, request: BatchRequest) -> BatchId {
        let batch_id = self.create(&request).batch_id;
        let this = self.clone();

        match self.background.lock() {
            Ok(mut background) => {
                reap_finished(&mut background);
                background.spawn(async move {
                    this.process(request).await;
                });
            }
            Err(_) => {
                tracing::error!(batch_id = %batch_id, "Background batch set poisoned");
                self.finish(batch_id, Err("Batch scheduler unavailable".to_string()));
            }
        }
        batch_id
    }

    /// Background batches not yet reaped.
    pub fn background_len(&self) -> usize {
        match self.background.lock() {
            Ok(mut background) => {
                reap_finished(&mut background);
                background.len()
            }
            Err(_) => 0,
        }
    }

    /// Wait for every background batch to finish.
    pub async fn wait_background(&self) {
        let mut pending = match self.background.lock() {
            Ok(mut background) => std::mem::take(&mut *background),
            Err(_) => return,
        };
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::error!("Background batch aborted: {}", e);
            }
        }
    }

    async fn process(&self, request: BatchRequest) -> BatchJob {
        let batch_id = request.batch_id;
        let tasks = self.convert_all(&request).await;

        let members: Vec<ArchiveMember> = tasks
            .iter()
            .filter(|(_, task)| task.has_outputs())
            .map(|(source, task)| ArchiveMember {
                task_id: task.id,
                display_name: Some(
                    source
                        .display_name
                        .clone()
                        .unwrap_or_else(|| task.filename.clone()),
                ),
                paths: task.outputs.iter().map(|o| o.path.clone()).collect(),
            })
            .collect();

        let outcome = if members.is_empty() {
            Err(NO_OUTPUTS_ERROR.to_string())
        } else {
            self.assemble(batch_id, members, request.layout).await
        };

        for source in &request.sources {
            cleanup_upload(&source.path).await;
        }

        self.finish(batch_id, outcome)
    }

    /// Convert every supported source; results arrive in completion order.
    async fn convert_all(&self, request: &BatchRequest) -> Vec<(BatchSource, Task)> {
        let mut set = JoinSet::new();
        let mut dispatched: HashMap<tokio::task::Id, BatchSource> = HashMap::new();

        for source in &request.sources {
            if ConversionEngine::media_kind(&source.path).is_none() {
                tracing::warn!(batch_id = %request.batch_id, "Skipping unsupported file: {:?}", source.path);
                continue;
            }

            let engine = self.engine.clone();
            let path = source.path.clone();
            let options = request.options.clone();
            let handle = set.spawn(async move { engine.convert(&path, &options).await });
            dispatched.insert(handle.id(), source.clone());
        }

        let mut tasks = Vec::with_capacity(dispatched.len());
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result.map_err(|e| format!("{:#}", e))),
                Err(e) => (e.id(), Err(format!("Conversion worker failed: {}", e))),
            };
            let Some(source) = dispatched.remove(&id) else {
                continue;
            };

            let task = match result {
                Ok(task) => task,
                Err(message) => {
                    tracing::error!(batch_id = %request.batch_id, "Task failed for {:?}: {}", source.path, message);
                    self.synthetic_failure(&source.path, message)
                }
            };
            tasks.push((source, task));
        }
        tasks
    }

    fn synthetic_failure(&self, path: &Path, message: String) -> Task {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let kind = ConversionEngine::media_kind(path).unwrap_or(MediaKind::Image);
        let task = Task::failed(filename, kind, message);
        self.engine.registry().insert(task.clone());
        task
    }

    /// Zip members; returns the contributing task ids and archive name.
    async fn assemble(
        &self,
        batch_id: BatchId,
        members: Vec<ArchiveMember>,
        layout: FolderStructure,
    ) -> std::result::Result<(Vec<TaskId>, String), String> {
        let archiver = self.archiver.clone();
        let task_ids: Vec<TaskId> = members.iter().map(|m| m.task_id).collect();
        let archive_name = batch_id.archive_name();

        let result =
            tokio::task::spawn_blocking(move || archiver.assemble(&archive_name, &members, layout))
                .await;

        match result {
            Ok(Ok(name)) => Ok((task_ids, name)),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(e) => Err(format!("Archive worker failed: {}", e)),
        }
    }

    /// Apply the terminal transition, persist it and publish it.
    fn finish(
        &self,
        batch_id: BatchId,
        outcome: std::result::Result<(Vec<TaskId>, String), String>,
    ) -> BatchJob {
        let mut job = BatchJob::processing(batch_id);

        match outcome {
            Ok((task_ids, archive)) => {
                job.status = BatchStatus::Completed;
                job.task_ids = task_ids.clone();
                job.zip_filename = Some(archive.clone());

                let update = BatchUpdate {
                    task_ids: Some(task_ids),
                    zip_filename: Some(archive.clone()),
                    ..Default::default()
                };
                self.persist(batch_id, BatchStatus::Completed, &update);
                tracing::info!(batch_id = %batch_id, "Batch completed: {}", archive);
                self.events
                    .publish(ConversionEvent::BatchCompleted { batch_id, archive });
            }
            Err(error) => {
                job.status = BatchStatus::Failed;
                job.error = Some(error.clone());

                let update = BatchUpdate {
                    error: Some(error.clone()),
                    ..Default::default()
                };
                self.persist(batch_id, BatchStatus::Failed, &update);
                tracing::error!(batch_id = %batch_id, "Batch failed: {}", error);
                self.events
                    .publish(ConversionEvent::BatchFailed { batch_id, error });
            }
        }

        self.jobs.insert(batch_id, job.clone());
        job
    }

    fn persist(&self, batch_id: BatchId, status: BatchStatus, update: &BatchUpdate) {
        if let Err(e) = self.gateway.update_status(batch_id, status, update) {
            tracing::warn!(batch_id = %batch_id, "Failed to persist batch status: {}", e);
        }
    }

    /// Current state; in-memory first, then the gateway. `None` when unknown.
    pub fn get(&self, batch_id: &BatchId) -> Option<BatchJob> {
        if let Some(job) = self.jobs.get(batch_id) {
            return Some(job.clone());
        }

        match self.gateway.read(*batch_id) {
            Ok(Some(record)) => {
                let job = BatchJob::from(record);
                self.jobs.insert(*batch_id, job.clone());
                Some(job)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(batch_id = %batch_id, "Failed to read batch: {}", e);
                None
            }
        }
    }

    /// Archive path of a completed batch whose file still exists.
    pub fn archive_path(&self, batch_id: &BatchId) -> Option<PathBuf> {
        let job = self.get(batch_id)?;
        if job.status != BatchStatus::Completed {
            return None;
        }
        let path = self.archiver.archive_path(job.zip_filename.as_deref()?);
        path.is_file().then_some(path)
    }

    /// Zip the outputs of arbitrary tasks under a fresh archive id.
    ///
    /// Unknown tasks and tasks without outputs are ignored.
    pub async fn zip_tasks(&self, task_ids: &[TaskId], layout: FolderStructure) -> Result<String> {
        let registry = self.engine.registry();
        let members: Vec<ArchiveMember> = task_ids
            .iter()
            .filter_map(|id| registry.get(id))
            .filter(Task::has_outputs)
            .map(|task| ArchiveMember {
                task_id: task.id,
                display_name: Some(task.filename.clone()),
                paths: task.outputs.iter().map(|o| o.path.clone()).collect(),
            })
            .collect();

        if members.is_empty() {
            return Err(Error::not_found("No outputs for the requested tasks").into());
        }

        let archiver = self.archiver.clone();
        let archive_name = BatchId::new().archive_name();
        tokio::task::spawn_blocking(move || archiver.assemble(&archive_name, &members, layout))
            .await
            .map_err(|e| anyhow::anyhow!("Archive worker failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::conversion::registry::TaskRegistry;
    use crate::persistence::SqliteGateway;
    use crate::transcode::MediaTranscoder;
    use image::{DynamicImage, Rgb, RgbImage};
    use mediaconv_av::VideoTranscoder;
    use mediaconv_common::TaskStatus;
    use tokio::sync::Semaphore;

    struct Harness {
        dir: tempfile::TempDir,
        coordinator: BatchCoordinator,
        gateway: Arc<SqliteGateway>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let outputs = dir.path().join("outputs");
        let zips = dir.path().join("zips");
        std::fs::create_dir_all(&outputs).unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();

        let events = EventBus::new();
        let transcoder = MediaTranscoder::new(
            outputs.clone(),
            ConversionConfig::default(),
            VideoTranscoder::new(PathBuf::from("/nonexistent/bin/ffmpeg")),
        );
        let engine = ConversionEngine::new(
            TaskRegistry::with_events(events.clone()),
            transcoder,
            Arc::new(Semaphore::new(2)),
        );
        let gateway = Arc::new(SqliteGateway::in_memory().unwrap());
        let coordinator = BatchCoordinator::new(
            engine,
            ArchiveAssembler::new(zips, outputs),
            gateway.clone(),
            events,
        );
        Harness {
            dir,
            coordinator,
            gateway,
        }
    }

    impl Harness {
        fn upload_png(&self, name: &str) -> BatchSource {
            let path = self.dir.path().join("uploads").join(name);
            DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([1, 2, 3])))
                .save_with_format(&path, image::ImageFormat::Png)
                .unwrap();
            BatchSource::from(path)
        }

        fn upload_bytes(&self, name: &str, bytes: &[u8]) -> BatchSource {
            let path = self.dir.path().join("uploads").join(name);
            std::fs::write(&path, bytes).unwrap();
            BatchSource::from(path)
        }
    }

    #[tokio::test]
    async fn test_partial_failure_completes() {
        let h = harness();
        let good = h.upload_png("good.png");
        let bad = h.upload_bytes("bad.png", b"garbage");
        let request = BatchRequest::new(vec![good.clone(), bad.clone()], ConversionOptions::default());
        let batch_id = request.batch_id;

        let job = h.coordinator.run(request).await;
        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.zip_filename, Some(batch_id.archive_name()));
        assert!(job.error.is_none());
        assert_eq!(job.task_ids.len(), 1);

        let contributing = h.coordinator.engine().registry().get(&job.task_ids[0]).unwrap();
        assert_eq!(contributing.filename, "good.png");
        assert!(h.coordinator.archive_path(&batch_id).is_some());

        // Sources are gone either way.
        assert!(!good.path.exists());
        assert!(!bad.path.exists());

        let record = h.gateway.read(batch_id).unwrap().unwrap();
        assert_eq!(record.status, BatchStatus::Completed);
        assert_eq!(record.task_ids, job.task_ids);
    }

    #[tokio::test]
    async fn test_all_failed_has_no_archive() {
        let h = harness();
        let bad = h.upload_bytes("bad.jpg", b"nope");
        let request = BatchRequest::new(vec![bad], ConversionOptions::default());
        let batch_id = request.batch_id;

        let job = h.coordinator.run(request).await;
        assert_eq!(job.status, BatchStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(NO_OUTPUTS_ERROR));
        assert!(job.zip_filename.is_none());
        assert!(h.coordinator.archive_path(&batch_id).is_none());
        assert!(!h.dir.path().join("zips").join(batch_id.archive_name()).exists());
    }

    #[tokio::test]
    async fn test_unsupported_files_skipped_and_deleted() {
        let h = harness();
        let notes = h.upload_bytes("notes.txt", b"hello");
        let good = h.upload_png("ok.png");
        let job = h
            .coordinator
            .run(BatchRequest::new(vec![notes.clone(), good], ConversionOptions::default()))
            .await;

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(h.coordinator.engine().registry().len(), 1);
        assert!(!notes.path.exists());
    }

    #[tokio::test]
    async fn test_finished_background_batches_are_reaped() {
        let h = harness();

        for name in ["one.png", "two.png", "three.png"] {
            let source = h.upload_png(name);
            let batch_id = h
                .coordinator
                .submit(BatchRequest::new(vec![source], ConversionOptions::default()));

            let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
            while h.coordinator.background_len() > 0 {
                assert!(std::time::Instant::now() < deadline, "batch never finished");
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            assert_eq!(h.coordinator.get(&batch_id).unwrap().status, BatchStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_submit_then_wait() {
        let h = harness();
        let mut rx = h.coordinator.events.subscribe();
        let source = h.upload_png("bg.png");

        let batch_id = h
            .coordinator
            .submit(BatchRequest::new(vec![source], ConversionOptions::default()));
        h.coordinator.wait_background().await;

        let job = h.coordinator.get(&batch_id).unwrap();
        assert_eq!(job.status, BatchStatus::Completed);

        let mut saw_completion = false;
        while let Ok(event) = rx.try_recv() {
            if event == (ConversionEvent::BatchCompleted {
                batch_id,
                archive: batch_id.archive_name(),
            }) {
                saw_completion = true;
            }
        }
        assert!(saw_completion);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_gateway() {
        let h = harness();
        let id = BatchId::new();
        assert!(h.coordinator.get(&id).is_none());

        h.gateway
            .save(id, BatchStatus::Failed, &[], None)
            .unwrap();
        let job = h.coordinator.get(&id).unwrap();
        assert_eq!(job.status, BatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_zip_tasks() {
        let h = harness();
        let source = h.upload_png("keep.png");
        let task = h
            .coordinator
            .engine()
            .convert(&source.path, &ConversionOptions::default())
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        let name = h
            .coordinator
            .zip_tasks(&[task.id, TaskId::new()], FolderStructure::ByFormat)
            .await
            .unwrap();
        assert!(h.dir.path().join("zips").join(&name).is_file());

        let err = h
            .coordinator
            .zip_tasks(&[TaskId::new()], FolderStructure::Flat)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
