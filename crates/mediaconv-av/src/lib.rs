//! # mediaconv-av
//!
//! External transcoder plumbing for mediaconv.
//!
//! This crate provides:
//! - Detection of the external tools video conversion depends on
//! - [`ToolCommand`], an async subprocess builder with a wall-clock timeout
//! - [`VideoTranscoder`], which builds and runs the ffmpeg invocation for
//!   each supported video output format
//!
//! ## Example
//!
//! ```no_run
//! use mediaconv_av::{VideoFormat, VideoTranscoder};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> mediaconv_av::Result<()> {
//! let transcoder = VideoTranscoder::locate(None).with_timeout(Duration::from_secs(300));
//! transcoder
//!     .transcode(Path::new("clip.mov"), Path::new("clip.mp4"), VideoFormat::Mp4, false)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
mod error;
pub mod tools;
pub mod video;

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use tools::{check_tools, require_tool, ToolInfo};
pub use video::{VideoFormat, VideoTranscoder};
