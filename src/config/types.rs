use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Extra named size presets (`name = [width, height]`), merged over the
    /// built-in table.
    #[serde(default)]
    pub presets: BTreeMap<String, [u32; 2]>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Staged source files; deleted after each batch.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Converted output files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Batch archives.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// SQLite database holding batch records.
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/outputs")
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("./data/zips")
}
fn default_database() -> PathBuf {
    PathBuf::from("./data/mediaconv.db")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            archive_dir: default_archive_dir(),
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Encoder quality when not web-optimized (default: 90)
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Encoder quality when web-optimized (default: 85)
    #[serde(default = "default_web_optimized_quality")]
    pub web_optimized_quality: u8,

    /// Encoder effort when not web-optimized (default: 4)
    #[serde(default = "default_effort")]
    pub default_effort: u8,

    /// Encoder effort when web-optimized (default: 6)
    #[serde(default = "default_web_optimized_effort")]
    pub web_optimized_effort: u8,

    /// Concurrent conversions (default: min(32, cpus + 4))
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Wall-clock limit for one external transcoder run, in seconds
    #[serde(default = "default_video_timeout")]
    pub video_timeout_secs: u64,
}

fn default_quality() -> u8 {
    90
}
fn default_web_optimized_quality() -> u8 {
    85
}
fn default_effort() -> u8 {
    4
}
fn default_web_optimized_effort() -> u8 {
    6
}
fn default_workers() -> usize {
    (num_cpus::get() + 4).min(32)
}
fn default_video_timeout() -> u64 {
    300
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
            web_optimized_quality: default_web_optimized_quality(),
            default_effort: default_effort(),
            web_optimized_effort: default_web_optimized_effort(),
            workers: default_workers(),
            video_timeout_secs: default_video_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; PATH lookup when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}
