//! Whole-file video transcoding through ffmpeg.
//!
//! One invocation produces one output file; audio is always dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};
use crate::tools::get_tool_path;
use crate::Result;

/// Video output container/codec combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    /// Animated WebP via libwebp.
    Webp,
    /// H.264 in MP4.
    Mp4,
    /// VP9 in WebM.
    Webm,
}

impl VideoFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Quality scale passed to `-crf` / `-q:v` (lower is better).
pub fn quality_scale(web_optimized: bool) -> &'static str {
    if web_optimized {
        "18"
    } else {
        "23"
    }
}

/// Build the ffmpeg argument list for one transcode.
pub fn ffmpeg_args(src: &Path, out: &Path, format: VideoFormat, web_optimized: bool) -> Vec<String> {
    let q = quality_scale(web_optimized);
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        src.to_string_lossy().to_string(),
    ];

    match format {
        VideoFormat::Webp => {
            let compression = if web_optimized { "4" } else { "6" };
            args.extend(
                [
                    "-vcodec",
                    "libwebp",
                    "-lossless",
                    "0",
                    "-compression_level",
                    compression,
                    "-q:v",
                    q,
                    "-loop",
                    "1",
                    "-an",
                    "-vsync",
                    "0",
                ]
                .map(String::from),
            );
        }
        VideoFormat::Mp4 => {
            args.extend(
                ["-c:v", "libx264", "-preset", "medium", "-crf", q, "-an"].map(String::from),
            );
        }
        VideoFormat::Webm => {
            args.extend(["-c:v", "libvpx-vp9", "-crf", q, "-b:v", "0", "-an"].map(String::from));
        }
    }

    args.push(out.to_string_lossy().to_string());
    args
}

/// Invokes ffmpeg with a bounded wall-clock time per output.
#[derive(Debug, Clone)]
pub struct VideoTranscoder {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl VideoTranscoder {
    /// Use a specific ffmpeg binary.
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Resolve ffmpeg from an optional configured path, then PATH.
    ///
    /// When neither resolves, the bare name is kept so that the failure
    /// surfaces per task ("ffmpeg not installed") instead of at startup.
    pub fn locate(configured: Option<&Path>) -> Self {
        match get_tool_path("ffmpeg", configured) {
            Ok(path) => Self::new(path),
            Err(e) => {
                tracing::warn!("{}; video conversions will fail", e);
                Self::new(PathBuf::from("ffmpeg"))
            }
        }
    }

    /// Override the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the ffmpeg binary in use.
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Transcode `src` into `out` in the given format.
    ///
    /// # Errors
    ///
    /// Fails when ffmpeg is missing, exits non-zero, or exceeds the timeout.
    pub async fn transcode(
        &self,
        src: &Path,
        out: &Path,
        format: VideoFormat,
        web_optimized: bool,
    ) -> Result<()> {
        ToolCommand::new(self.ffmpeg.clone())
            .args(ffmpeg_args(src, out, format, web_optimized))
            .timeout(self.timeout)
            .execute()
            .await?;
        Ok(())
    }
}
