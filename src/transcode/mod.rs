//! Produces output files for one source: in-process encoders for images,
//! ffmpeg for videos.
//!
//! Every output path embeds the short task id, so concurrent tasks never
//! write to the same file.

pub mod image;
pub mod metadata;
pub mod video;

use anyhow::{Context, Result};
use mediaconv_av::VideoTranscoder;
use mediaconv_common::{MediaKind, OutputFormat, TaskId};
use std::path::{Path, PathBuf};

use crate::config::ConversionConfig;
use crate::conversion::options::ConversionOptions;
use crate::conversion::presets::{self, SizePreset};
use crate::conversion::registry::TaskHandle;
use crate::conversion::task::TaskOutput;

use self::image::SourceImage;

/// Writes conversion outputs into a single output directory.
#[derive(Debug, Clone)]
pub struct MediaTranscoder {
    output_dir: PathBuf,
    config: ConversionConfig,
    video: VideoTranscoder,
}

fn stem(src: &Path) -> String {
    src.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

/// Formats valid for `kind`, in request order; the rest are dropped with a warning.
pub fn applicable_formats(formats: &[OutputFormat], kind: MediaKind) -> Vec<OutputFormat> {
    let mut out = Vec::new();
    for format in formats {
        if !format.supports(kind) {
            tracing::warn!("Unsupported {} output format requested: {}", kind, format);
            continue;
        }
        if !out.contains(format) {
            out.push(*format);
        }
    }
    out
}

impl MediaTranscoder {
    pub fn new(output_dir: PathBuf, config: ConversionConfig, video: VideoTranscoder) -> Self {
        Self {
            output_dir,
            config,
            video,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{stem}_{id8}_{suffix}.{ext}`
    pub fn image_output_path(
        &self,
        src: &Path,
        task_id: &TaskId,
        preset: &SizePreset,
        format: OutputFormat,
    ) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}.{}",
            stem(src),
            task_id.short(),
            preset.suffix(),
            format.extension()
        ))
    }

    /// `{stem}_{id8}.{ext}`
    pub fn video_output_path(&self, src: &Path, task_id: &TaskId, format: OutputFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            stem(src),
            task_id.short(),
            format.extension()
        ))
    }

    /// Convert an image to every (size × format) combination.
    ///
    /// Blocking; run it off the async runtime. Progress is advanced after
    /// each file is written.
    pub fn convert_image(
        &self,
        src: &Path,
        task: &TaskHandle,
        options: &ConversionOptions,
    ) -> Result<()> {
        let formats = applicable_formats(&options.formats, MediaKind::Image);
        let sizes: Vec<SizePreset> = if options.sizes.is_empty() {
            vec![SizePreset::original()]
        } else {
            presets::dedup_by_suffix(options.sizes.clone())
        };
        let total = (formats.len() * sizes.len()).max(1);
        let settings = options.encoder_settings(&self.config);

        let mut source = SourceImage::open(src)?;
        if let Some(region) = options.crop {
            source.crop(&region);
        }
        let carried = (!settings.strip_metadata).then_some(&source.metadata);

        let mut step = 0;
        for preset in &sizes {
            let working =
                image::render(&source.image, preset, options.fill_mode, options.fill_color);

            for format in &formats {
                let out_path = self.image_output_path(src, &task.id(), preset, *format);
                let encoded = image::encode(&working, *format, &settings)
                    .with_context(|| format!("Failed to encode {} ({})", format, preset.suffix()))?;
                let encoded = metadata::apply(encoded, *format, carried)?;

                std::fs::write(&out_path, &encoded)
                    .with_context(|| format!("Failed to write output: {:?}", out_path))?;
                let size = std::fs::metadata(&out_path)?.len();

                task.record_output(TaskOutput {
                    path: out_path.clone(),
                    format: *format,
                    size,
                });
                step += 1;
                task.progress(step as f64 / total as f64 * 100.0);

                tracing::debug!(
                    task_id = %task.id(),
                    "Converted {:?} -> {:?} ({} bytes)",
                    src.file_name().unwrap_or_default(),
                    out_path.file_name().unwrap_or_default(),
                    size
                );
            }
        }

        Ok(())
    }

    /// Convert a video once per requested format.
    pub async fn convert_video(
        &self,
        src: &Path,
        task: &TaskHandle,
        options: &ConversionOptions,
    ) -> Result<()> {
        let formats = applicable_formats(&options.formats, MediaKind::Video);
        let total = formats.len().max(1);

        for (i, format) in formats.iter().enumerate() {
            let Some(target) = video::video_format(*format) else {
                continue;
            };
            let out_path = self.video_output_path(src, &task.id(), *format);

            self.video
                .transcode(src, &out_path, target, options.web_optimized)
                .await?;

            let size = tokio::fs::metadata(&out_path)
                .await
                .with_context(|| format!("Transcoder produced no output: {:?}", out_path))?
                .len();

            task.record_output(TaskOutput {
                path: out_path.clone(),
                format: *format,
                size,
            });
            task.progress((i + 1) as f64 / total as f64 * 100.0);

            tracing::debug!(
                task_id = %task.id(),
                "Converted video {:?} -> {:?}",
                src.file_name().unwrap_or_default(),
                out_path.file_name().unwrap_or_default()
            );
        }

        Ok(())
    }
}
