//! Mediaconv-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mediaconv:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for tasks and batches
//! - **Core Types**: Enums for media kinds, task/batch states, fill modes and formats
//! - **Path Utilities**: Classification of source files by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use mediaconv_common::{paths::media_kind, FillMode, MediaKind, TaskId};
//! use std::path::Path;
//!
//! let task_id = TaskId::new();
//! assert_eq!(task_id.short().len(), 8);
//!
//! assert_eq!("color".parse::<FillMode>().unwrap(), FillMode::Color);
//! assert_eq!(media_kind(Path::new("clip.mp4")), Some(MediaKind::Video));
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
