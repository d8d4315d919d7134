//! Path utilities for classifying source files by extension.
//!
//! The media kind of a source is decided purely from its extension; content
//! sniffing is left to the decoders.

use std::path::Path;

use crate::MediaKind;

/// List of supported image source extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "avif"];

/// List of supported video source extensions.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "m4v"];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Classify a path as image or video by its extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediaconv_common::{paths::media_kind, MediaKind};
///
/// assert_eq!(media_kind(Path::new("photo.JPG")), Some(MediaKind::Image));
/// assert_eq!(media_kind(Path::new("clip.mkv")), Some(MediaKind::Video));
/// assert_eq!(media_kind(Path::new("notes.txt")), None);
/// ```
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = lowercase_extension(path)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Check if a path has an image file extension.
pub fn is_image_file(path: &Path) -> bool {
    media_kind(path) == Some(MediaKind::Image)
}

/// Check if a path has a video file extension.
pub fn is_video_file(path: &Path) -> bool {
    media_kind(path) == Some(MediaKind::Video)
}

/// Get the list of image source extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

/// Get the list of video source extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}
