//! Single-file conversion orchestration.
//!
//! The engine owns the task state machine:
//!
//! ```text
//! pending -> converting -> completed
//!                      \-> failed
//! ```
//!
//! Conversion failures never surface as `Err`; they end up in the task's
//! `error`. Only classification failures (an unsupported extension) are
//! returned as errors, and in that case no task is created.

use anyhow::Result;
use mediaconv_common::{paths, MediaKind, TaskId, TaskStatus};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::options::ConversionOptions;
use super::registry::{TaskHandle, TaskRegistry};
use super::task::Task;
use crate::transcode::MediaTranscoder;

/// Runs conversions and records them in a [`TaskRegistry`].
#[derive(Clone)]
pub struct ConversionEngine {
    registry: TaskRegistry,
    transcoder: Arc<MediaTranscoder>,
    workers: Arc<Semaphore>,
}

impl ConversionEngine {
    pub fn new(registry: TaskRegistry, transcoder: MediaTranscoder, workers: Arc<Semaphore>) -> Self {
        Self {
            registry,
            transcoder: Arc::new(transcoder),
            workers,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn transcoder(&self) -> &MediaTranscoder {
        &self.transcoder
    }

    /// Media kind of a path by extension; `None` means unsupported.
    pub fn media_kind(path: &Path) -> Option<MediaKind> {
        paths::media_kind(path)
    }

    /// Convert one file, holding a worker permit for the duration.
    ///
    /// # Errors
    ///
    /// Returns an error only for an unsupported extension or a closed worker
    /// pool. Every conversion failure is reported through the returned task.
    pub async fn convert(&self, path: &Path, options: &ConversionOptions) -> Result<Task> {
        let kind = Self::media_kind(path).ok_or_else(|| {
            mediaconv_common::Error::unsupported(format!(
                "Unsupported file type: {:?}",
                path.extension().unwrap_or_default()
            ))
        })?;

        let _permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("Worker pool is shut down"))?;

        Ok(self.convert_classified(path, kind, options).await)
    }

    async fn convert_classified(&self, path: &Path, kind: MediaKind, options: &ConversionOptions) -> Task {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let handle = Arc::new(self.registry.create(filename, kind));
        let task_id = handle.id();

        let input_size = tokio::fs::metadata(path).await.ok().filter(|m| m.is_file()).map(|m| m.len());
        handle.set_input_size(input_size);
        handle.start();

        tracing::info!(task_id = %task_id, kind = %kind, "Converting {:?}", path);

        let result = match kind {
            MediaKind::Image => self.run_image(path, Arc::clone(&handle), options).await,
            MediaKind::Video => self.transcoder.convert_video(path, &handle, options).await,
        };

        match result {
            Ok(()) => {
                handle.complete();
                tracing::info!(task_id = %task_id, "Conversion completed for {:?}", path);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!(task_id = %task_id, "Conversion failed for {:?}: {}", path, message);
                handle.fail(message);
            }
        }

        self.snapshot(&handle)
    }

    async fn run_image(&self, path: &Path, handle: Arc<TaskHandle>, options: &ConversionOptions) -> Result<()> {
        let transcoder = Arc::clone(&self.transcoder);
        let path = path.to_path_buf();
        let options = options.clone();

        tokio::task::spawn_blocking(move || transcoder.convert_image(&path, &handle, &options))
            .await
            .map_err(|e| anyhow::anyhow!("Image worker panicked: {}", e))?
    }

    fn snapshot(&self, handle: &TaskHandle) -> Task {
        handle.snapshot().unwrap_or_else(|| {
            let mut task = Task::new(String::new(), MediaKind::Image);
            task.id = handle.id();
            task.status = TaskStatus::Failed;
            task.error = Some("Task record disappeared".to_string());
            task
        })
    }

    /// Delete every output file of a task. Returns false for an unknown task.
    pub async fn cleanup_task_outputs(&self, task_id: &TaskId) -> bool {
        let Some(task) = self.registry.get(task_id) else {
            return false;
        };

        for output in &task.outputs {
            match tokio::fs::remove_file(&output.path).await {
                Ok(()) => tracing::debug!(task_id = %task_id, "Removed {:?}", output.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(task_id = %task_id, "Failed to remove {:?}: {}", output.path, e),
            }
        }
        true
    }
}

/// Remove an uploaded file or directory tree; absence is not an error.
pub async fn cleanup_upload(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return,
    };

    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to clean up upload {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::conversion::presets::SizePreset;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use mediaconv_av::VideoTranscoder;
    use mediaconv_common::OutputFormat;
    use std::path::PathBuf;

    fn engine(out: &Path) -> ConversionEngine {
        let transcoder = MediaTranscoder::new(
            out.to_path_buf(),
            ConversionConfig::default(),
            VideoTranscoder::new(PathBuf::from("/nonexistent/bin/ffmpeg")),
        );
        ConversionEngine::new(TaskRegistry::new(), transcoder, Arc::new(Semaphore::new(2)))
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 100, 50])))
            .save(path)
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_extension_creates_no_task() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let err = engine
            .convert(Path::new("notes.txt"), &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn test_image_every_combination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.png");
        write_png(&src, 80, 60);

        let engine = engine(dir.path());
        let options = ConversionOptions {
            formats: vec![OutputFormat::Png, OutputFormat::Jpeg],
            sizes: vec![
                SizePreset::original(),
                SizePreset {
                    width: Some(40),
                    height: Some(40),
                    label: "40x40".into(),
                },
            ],
            ..Default::default()
        };

        let task = engine.convert(&src, &options).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.outputs.len(), 4);
        assert_eq!(task.input_size, Some(std::fs::metadata(&src).unwrap().len()));

        let id8 = task.id.short();
        let names: Vec<String> = task
            .outputs
            .iter()
            .map(|o| o.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                format!("photo_{id8}_original.png"),
                format!("photo_{id8}_original.jpeg"),
                format!("photo_{id8}_40x40.png"),
                format!("photo_{id8}_40x40.jpeg"),
            ]
        );
        for output in &task.outputs {
            assert_eq!(std::fs::metadata(&output.path).unwrap().len(), output.size);
        }
        let resized = image::open(&task.outputs[2].path).unwrap();
        assert_eq!(resized.dimensions(), (40, 40));

        assert_eq!(engine.registry().get(&task.id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"not really a jpeg").unwrap();

        let engine = engine(dir.path());
        let task = engine.convert(&src, &ConversionOptions::default()).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.is_some());
        assert!(task.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_fails_video_task() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("clip.mp4");
        std::fs::write(&src, b"\x00\x00\x00\x18ftypmp42").unwrap();

        let engine = engine(dir.path());
        let options = ConversionOptions {
            formats: vec![OutputFormat::Webm],
            ..Default::default()
        };
        let task = engine.convert(&src, &options).await.unwrap();
        assert_eq!(task.media_kind, MediaKind::Video);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("ffmpeg not installed"));
    }

    #[tokio::test]
    async fn test_cleanup_task_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.png");
        write_png(&src, 10, 10);

        let engine = engine(dir.path());
        let task = engine.convert(&src, &ConversionOptions::default()).await.unwrap();
        let output = task.outputs[0].path.clone();
        assert!(output.exists());

        assert!(engine.cleanup_task_outputs(&task.id).await);
        assert!(!output.exists());
        // Second pass ignores files already gone.
        assert!(engine.cleanup_task_outputs(&task.id).await);
        assert!(!engine.cleanup_task_outputs(&TaskId::new()).await);
    }

    #[tokio::test]
    async fn test_cleanup_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();
        let tree = dir.path().join("nested");
        std::fs::create_dir_all(tree.join("deeper")).unwrap();
        std::fs::write(tree.join("deeper/b.png"), b"y").unwrap();

        cleanup_upload(&file).await;
        cleanup_upload(&tree).await;
        cleanup_upload(&dir.path().join("never-existed")).await;

        assert!(!file.exists());
        assert!(!tree.exists());
    }
}
