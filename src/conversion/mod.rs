//! Conversion orchestration.
//!
//! - [`TaskRegistry`] holds every task and is what status polling reads
//! - [`ConversionEngine`] drives one source file through the task state machine
//! - [`BatchCoordinator`] fans a batch out over the engine and zips the results
//! - [`presets`] and [`options`] turn request parameters into concrete settings

pub mod batch;
pub mod engine;
pub mod options;
pub mod presets;
pub mod registry;
pub mod task;

pub use batch::{BatchCoordinator, BatchJob, BatchRequest, BatchSource};
pub use engine::{cleanup_upload, ConversionEngine};
pub use options::{ConversionOptions, EncoderSettings};
pub use presets::SizePreset;
pub use registry::{TaskHandle, TaskRegistry};
pub use task::{Task, TaskOutput};
