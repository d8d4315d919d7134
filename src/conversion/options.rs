//! Per-request conversion options and the encoder settings derived from them.

use mediaconv_common::{FillMode, OutputFormat};
use serde::Serialize;

use crate::config::ConversionConfig;
use crate::geometry::{CropRegion, Rgb, DEFAULT_FILL};

use super::presets::SizePreset;

/// Highest size-reduction percent that overrides quality.
pub const MAX_SIZE_REDUCTION: u8 = 80;

/// Options shared by every file of a request.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOptions {
    pub formats: Vec<OutputFormat>,
    pub sizes: Vec<SizePreset>,
    pub fill_mode: FillMode,
    pub fill_color: Rgb,
    /// 0..=80; values outside the range are ignored.
    pub size_reduction_percent: Option<u8>,
    pub strip_metadata: bool,
    pub progressive: bool,
    pub aggressive: bool,
    pub web_optimized: bool,
    /// Applied to images before resizing.
    pub crop: Option<CropRegion>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Webp],
            sizes: vec![SizePreset::original()],
            fill_mode: FillMode::Crop,
            fill_color: DEFAULT_FILL,
            size_reduction_percent: None,
            strip_metadata: false,
            progressive: false,
            aggressive: false,
            web_optimized: false,
            crop: None,
        }
    }
}

/// Concrete settings handed to the image encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    /// 1..=100
    pub quality: u8,
    /// 0..=6
    pub effort: u8,
    pub progressive: bool,
    pub strip_metadata: bool,
}

/// Quality for a size-reduction percent: `95 - trunc(p * 0.9)`, clamped to 25..=95.
pub fn quality_for_reduction(percent: u8) -> u8 {
    let q = 95 - (percent as f64 * 0.9) as i32;
    q.clamp(25, 95) as u8
}

impl ConversionOptions {
    pub fn derive_quality(&self, config: &ConversionConfig) -> u8 {
        match self.size_reduction_percent {
            Some(p) if p <= MAX_SIZE_REDUCTION => quality_for_reduction(p),
            _ if self.web_optimized => config.web_optimized_quality,
            _ => config.default_quality,
        }
    }

    pub fn derive_effort(&self, config: &ConversionConfig) -> u8 {
        if self.aggressive {
            crate::config::MAX_EFFORT
        } else if self.web_optimized {
            config.web_optimized_effort
        } else {
            config.default_effort
        }
    }

    pub fn encoder_settings(&self, config: &ConversionConfig) -> EncoderSettings {
        EncoderSettings {
            quality: self.derive_quality(config),
            effort: self.derive_effort(config),
            progressive: self.progressive,
            strip_metadata: self.strip_metadata,
        }
    }
}
