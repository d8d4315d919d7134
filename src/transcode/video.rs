//! Bridge from output formats to the external video transcoder.

use mediaconv_av::VideoFormat;
use mediaconv_common::OutputFormat;

/// The ffmpeg target for a video output format, if it has one.
pub fn video_format(format: OutputFormat) -> Option<VideoFormat> {
    match format {
        OutputFormat::Webp => Some(VideoFormat::Webp),
        OutputFormat::Mp4 => Some(VideoFormat::Mp4),
        OutputFormat::Webm => Some(VideoFormat::Webm),
        OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::Avif => None,
    }
}
