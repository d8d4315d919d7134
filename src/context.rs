//! Explicitly constructed orchestration context.
//!
//! Build one [`Context`] at process start, hand it (or clones of its parts)
//! to every entry point and call [`Context::shutdown`] before exiting.

use anyhow::{Context as _, Result};
use mediaconv_av::VideoTranscoder;
use mediaconv_common::BatchId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::archive::ArchiveAssembler;
use crate::config::Config;
use crate::conversion::{
    cleanup_upload, BatchCoordinator, BatchSource, ConversionEngine, TaskRegistry,
};
use crate::events::EventBus;
use crate::persistence::{PersistenceGateway, SqliteGateway};
use crate::transcode::MediaTranscoder;

/// Everything the conversion entry points share.
pub struct Context {
    pub config: Config,
    pub events: EventBus,
    pub registry: TaskRegistry,
    pub engine: ConversionEngine,
    pub batches: BatchCoordinator,
    pub gateway: Arc<dyn PersistenceGateway>,
    workers: Arc<Semaphore>,
}

impl Context {
    /// Create the working directories and wire up every component.
    pub fn new(config: Config) -> Result<Self> {
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(SqliteGateway::open(&config.paths.database)?);
        Self::with_gateway(config, gateway)
    }

    /// As [`Context::new`], with a caller-supplied persistence gateway.
    pub fn with_gateway(config: Config, gateway: Arc<dyn PersistenceGateway>) -> Result<Self> {
        config.ensure_dirs()?;

        let events = EventBus::new();
        let registry = TaskRegistry::with_events(events.clone());
        let workers = Arc::new(Semaphore::new(config.conversion.workers));

        let video = VideoTranscoder::locate(config.tools.ffmpeg_path.as_deref())
            .with_timeout(Duration::from_secs(config.conversion.video_timeout_secs));
        let transcoder = MediaTranscoder::new(
            config.paths.output_dir.clone(),
            config.conversion.clone(),
            video,
        );
        let engine = ConversionEngine::new(registry.clone(), transcoder, Arc::clone(&workers));

        let archiver = ArchiveAssembler::new(
            config.paths.archive_dir.clone(),
            config.paths.output_dir.clone(),
        );
        let batches =
            BatchCoordinator::new(engine.clone(), archiver, Arc::clone(&gateway), events.clone());

        tracing::info!(
            workers = config.conversion.workers,
            durable = gateway.is_durable(),
            "Conversion context ready"
        );

        Ok(Self {
            config,
            events,
            registry,
            engine,
            batches,
            gateway,
            workers,
        })
    }

    /// Copy a caller's file into the upload directory for a batch.
    ///
    /// The copy is named `{batch_id}_{rand8}_{filename}`; the batch deletes it
    /// when it finishes, leaving the original alone.
    pub async fn stage_upload(&self, path: &Path, batch_id: &BatchId) -> Result<BatchSource> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Not a file path: {:?}", path))?;

        let rand8: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let staged = self
            .config
            .paths
            .upload_dir
            .join(format!("{}_{}_{}", batch_id, rand8, filename));

        tokio::fs::copy(path, &staged)
            .await
            .with_context(|| format!("Failed to stage {:?}", path))?;

        Ok(BatchSource {
            path: staged,
            display_name: Some(filename),
        })
    }

    /// Stage every file for a batch, or none of them.
    ///
    /// Copies already made are removed when a later file fails to stage.
    pub async fn stage_uploads(
        &self,
        paths: &[PathBuf],
        batch_id: &BatchId,
    ) -> Result<Vec<BatchSource>> {
        let mut staged = Vec::with_capacity(paths.len());
        for path in paths {
            match self.stage_upload(path, batch_id).await {
                Ok(source) => staged.push(source),
                Err(e) => {
                    for source in &staged {
                        cleanup_upload(&source.path).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(staged)
    }

    /// Stop accepting conversions and wait for background batches.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down conversion context");
        self.batches.wait_background().await;
        self.workers.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionOptions;

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.upload_dir = root.join("uploads");
        config.paths.output_dir = root.join("outputs");
        config.paths.archive_dir = root.join("zips");
        config.paths.database = root.join("mediaconv.db");
        config.conversion.workers = 2;
        config
    }

    #[tokio::test]
    async fn test_new_creates_dirs_and_durable_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(dir.path())).unwrap();
        assert!(dir.path().join("uploads").is_dir());
        assert!(dir.path().join("outputs").is_dir());
        assert!(dir.path().join("zips").is_dir());
        assert!(ctx.gateway.is_durable());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_stage_upload_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(dir.path())).unwrap();
        let original = dir.path().join("holiday.png");
        std::fs::write(&original, b"png-ish").unwrap();

        let batch_id = BatchId::new();
        let staged = ctx.stage_upload(&original, &batch_id).await.unwrap();
        let staged_name = staged.path.file_name().unwrap().to_string_lossy().to_string();

        assert!(staged_name.starts_with(&format!("{}_", batch_id)));
        assert!(staged_name.ends_with("_holiday.png"));
        assert_eq!(staged.display_name.as_deref(), Some("holiday.png"));
        assert!(staged.path.starts_with(dir.path().join("uploads")));
        assert!(original.exists());
    }

    #[tokio::test]
    async fn test_failed_staging_removes_earlier_copies() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(dir.path())).unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();
        let missing = dir.path().join("missing.png");

        let batch_id = BatchId::new();
        let result = ctx
            .stage_uploads(&[first.clone(), second.clone(), missing], &batch_id)
            .await;
        assert!(result.is_err());

        let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(first.exists());
        assert!(second.exists());

        let staged = ctx.stage_uploads(&[first, second], &batch_id).await.unwrap();
        assert_eq!(staged.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_conversions() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(dir.path())).unwrap();
        ctx.shutdown().await;

        let src = dir.path().join("late.png");
        std::fs::write(&src, b"x").unwrap();
        let err = ctx
            .engine
            .convert(&src, &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }
}
