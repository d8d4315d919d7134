//! Image decoding, per-preset rendering and encoding.

use anyhow::{Context, Result};
use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageReader};
use mediaconv_common::{FillMode, OutputFormat};
use std::io::Cursor;
use std::path::Path;

use super::metadata::SourceMetadata;
use crate::conversion::options::EncoderSettings;
use crate::conversion::presets::SizePreset;
use crate::geometry::{self, CropRegion, Rgb};

/// A decoded source image plus the metadata it carried.
pub struct SourceImage {
    pub image: DynamicImage,
    pub metadata: SourceMetadata,
}

impl SourceImage {
    /// Decode a file, sniffing the format from its content.
    pub fn open(path: &Path) -> Result<Self> {
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;

        let image = ImageReader::new(Cursor::new(&data))
            .with_guessed_format()
            .context("Failed to sniff image format")?
            .decode()
            .with_context(|| format!("Failed to decode image: {:?}", path))?;

        Ok(Self {
            metadata: SourceMetadata::read(&data),
            image,
        })
    }

    /// Apply a crop region to the decoded image.
    pub fn crop(&mut self, region: &CropRegion) {
        let cropped = geometry::apply_crop(&self.image, region);
        tracing::debug!(
            "Cropped source {:?} -> {:?}",
            self.image.dimensions(),
            cropped.dimensions()
        );
        self.image = cropped;
    }
}

/// Produce the working image for one size preset.
pub fn render(img: &DynamicImage, preset: &SizePreset, mode: FillMode, fill: Rgb) -> DynamicImage {
    match (preset.width, preset.height) {
        (Some(w), Some(h)) => geometry::resize_to_fit(img, w, h, mode, fill),
        (None, None) => img.clone(),
        (w, h) => geometry::resize_keep_aspect(img, w, h),
    }
}

/// Encode an image into the requested format.
pub fn encode(img: &DynamicImage, format: OutputFormat, settings: &EncoderSettings) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, settings),
        OutputFormat::Webp => encode_webp(img, settings),
        OutputFormat::Png => encode_png(img),
        OutputFormat::Avif => encode_avif(img, settings),
        OutputFormat::Mp4 | OutputFormat::Webm => {
            anyhow::bail!("{} is not an image output format", format)
        }
    }
}

fn encode_jpeg(img: &DynamicImage, settings: &EncoderSettings) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(settings.quality as f32);
    if settings.progressive {
        comp.set_progressive_mode();
    }
    comp.set_optimize_coding(true);

    let mut comp = comp
        .start_compress(Vec::new())
        .context("Failed to start JPEG compression")?;
    comp.write_scanlines(&rgb)
        .context("Failed to write JPEG scanlines")?;
    comp.finish().context("Failed to finish JPEG")
}

fn encode_webp(img: &DynamicImage, settings: &EncoderSettings) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut config =
        webp::WebPConfig::new().map_err(|_| anyhow::anyhow!("Failed to initialise WebP config"))?;
    config.quality = settings.quality as f32;
    config.method = settings.effort as i32;

    let encoded = webp::Encoder::from_rgba(&rgba, width, height)
        .encode_advanced(&config)
        .map_err(|e| anyhow::anyhow!("WebP encoding failed: {:?}", e))?;

    Ok(encoded.to_vec())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .context("PNG encoding failed")?;
    Ok(out)
}

/// Encoder speed for an effort level: `10 - effort`, within 1..=10.
pub fn avif_speed(effort: u8) -> u8 {
    10u8.saturating_sub(effort).clamp(1, 10)
}

fn encode_avif(img: &DynamicImage, settings: &EncoderSettings) -> Result<Vec<u8>> {
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut out = Vec::new();
    let encoder =
        AvifEncoder::new_with_speed_quality(&mut out, avif_speed(settings.effort), settings.quality);
    normalized
        .write_with_encoder(encoder)
        .context("AVIF encoding failed")?;
    Ok(out)
}
