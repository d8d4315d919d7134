//! Core type definitions for tasks, batches, and conversion options.
//!
//! All enums serialize in lowercase (`snake_case` for multi-word variants)
//! and parse case-insensitively. Parsing is strict; callers that need an
//! "unrecognized means default" rule apply it at their boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of source media, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A still (or animated) image decoded in-process.
    Image,
    /// A video handed to the external transcoder.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Lifecycle state of a conversion task.
///
/// `Pending -> Converting -> {Completed | Failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Converting,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Converting => write!(f, "converting"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::invalid_input(format!("unknown batch status: {other}"))),
        }
    }
}

/// Policy for reconciling the source aspect ratio with a fixed target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Scale to cover, then center-crop the overflow.
    #[default]
    Crop,
    /// Scale to fit inside, then pad with a solid color.
    Color,
    /// Scale to cover, blur, then center-crop.
    Blur,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crop => write!(f, "crop"),
            Self::Color => write!(f, "color"),
            Self::Blur => write!(f, "blur"),
        }
    }
}

impl FromStr for FillMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crop" => Ok(Self::Crop),
            "color" => Ok(Self::Color),
            "blur" => Ok(Self::Blur),
            other => Err(Error::invalid_input(format!("unknown fill mode: {other}"))),
        }
    }
}

/// Folder layout used inside a batch archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStructure {
    /// Every entry at the archive root, prefixed with the short task id.
    #[default]
    Flat,
    /// One folder per source file.
    ByFile,
    /// One folder per output extension.
    ByFormat,
}

impl fmt::Display for FolderStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::ByFile => write!(f, "by_file"),
            Self::ByFormat => write!(f, "by_format"),
        }
    }
}

impl FromStr for FolderStructure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "by_file" => Ok(Self::ByFile),
            "by_format" => Ok(Self::ByFormat),
            other => Err(Error::invalid_input(format!(
                "unknown folder structure: {other}"
            ))),
        }
    }
}

/// A requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Png,
    Avif,
    Mp4,
    Webm,
}

impl OutputFormat {
    /// Formats an image source can be converted to.
    pub const IMAGE: &'static [OutputFormat] = &[Self::Webp, Self::Jpeg, Self::Png, Self::Avif];

    /// Formats a video source can be converted to.
    pub const VIDEO: &'static [OutputFormat] = &[Self::Webp, Self::Mp4, Self::Webm];

    /// File extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Avif => "avif",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    /// Whether a source of the given kind can be converted to this format.
    pub fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => Self::IMAGE.contains(self),
            MediaKind::Video => Self::VIDEO.contains(self),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "avif" => Ok(Self::Avif),
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            other => Err(Error::unsupported(format!("output format: {other}"))),
        }
    }
}
