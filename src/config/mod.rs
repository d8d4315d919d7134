mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::conversion::presets::MAX_DIMENSION;

/// Highest encoder effort any codec accepts.
pub const MAX_EFFORT: u8 = 6;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./mediaconv.toml",
        "~/.config/mediaconv/config.toml",
        "/etc/mediaconv/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

impl Config {
    /// Create the upload, output and archive directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.paths.upload_dir,
            &self.paths.output_dir,
            &self.paths.archive_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let conversion = &config.conversion;

    if conversion.workers == 0 {
        anyhow::bail!("conversion.workers must be at least 1");
    }

    if conversion.video_timeout_secs == 0 {
        anyhow::bail!("conversion.video_timeout_secs must be at least 1");
    }

    for (name, quality) in [
        ("default_quality", conversion.default_quality),
        ("web_optimized_quality", conversion.web_optimized_quality),
    ] {
        if !(1..=100).contains(&quality) {
            anyhow::bail!("conversion.{} must be within 1..=100, got {}", name, quality);
        }
    }

    for (name, effort) in [
        ("default_effort", conversion.default_effort),
        ("web_optimized_effort", conversion.web_optimized_effort),
    ] {
        if effort > MAX_EFFORT {
            anyhow::bail!(
                "conversion.{} must be within 0..={}, got {}",
                name,
                MAX_EFFORT,
                effort
            );
        }
    }

    for (name, [w, h]) in &config.presets {
        if !(1..=MAX_DIMENSION).contains(w) || !(1..=MAX_DIMENSION).contains(h) {
            anyhow::bail!(
                "Preset '{}' has dimensions {}x{} outside 1..={}",
                name,
                w,
                h,
                MAX_DIMENSION
            );
        }
        if name.contains('x') && name.chars().all(|c| c.is_ascii_digit() || c == 'x') {
            anyhow::bail!("Preset name '{}' collides with the WxH size syntax", name);
        }
    }

    if let Some(ref ffmpeg) = config.tools.ffmpeg_path {
        if !ffmpeg.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", ffmpeg);
        }
    }

    Ok(())
}
