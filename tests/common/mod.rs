//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a fully constructed [`Context`] rooted in a
//! scratch directory, plus helpers that generate source images in-test.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage};
use mediaconv::config::Config;
use mediaconv::Context;
use tempfile::TempDir;

/// Test harness wrapping a [`Context`] whose directories and database live
/// in a temporary directory.
pub struct TestHarness {
    pub ctx: Context,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a harness with default conversion settings.
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    /// Create a harness after letting the caller adjust the config.
    pub fn with(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = config_in(dir.path());
        adjust(&mut config);
        let ctx = Context::new(config).expect("failed to build context");
        Self { ctx, dir }
    }

    /// Directory for caller-owned source files (not the upload dir).
    pub fn sources(&self) -> PathBuf {
        let dir = self.dir.path().join("sources");
        std::fs::create_dir_all(&dir).expect("failed to create sources dir");
        dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.ctx.config.paths.output_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.ctx.config.paths.upload_dir
    }
}

/// Config with every path under `root`.
pub fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.upload_dir = root.join("uploads");
    config.paths.output_dir = root.join("outputs");
    config.paths.archive_dir = root.join("zips");
    config.paths.database = root.join("mediaconv.db");
    config.conversion.workers = 4;
    config
}

/// A horizontal gradient, so resized output is not uniform.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            96,
        ])
    })
}

/// Write an RGB PNG source image.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height).save(&path).expect("failed to write png");
    path
}

/// Write a half-transparent RGBA PNG source image.
pub fn write_rgba_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([200, 30, 30, 128]));
    img.save(&path).expect("failed to write png");
    path
}

/// Write a JPEG source image.
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height).save(&path).expect("failed to write jpeg");
    path
}

/// Write bytes that carry an image extension but do not decode.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not an image").expect("failed to write file");
    path
}
