//! Pure image geometry: exact-size fitting, aspect-preserving resize and crop
//! normalization.
//!
//! Nothing in this module touches the filesystem. Every function takes an
//! already decoded [`DynamicImage`] and returns a new one. Images with an
//! alpha channel keep it; everything else comes back as 8-bit RGB.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use mediaconv_common::FillMode;
use serde::{Deserialize, Serialize};

/// An RGB triple.
pub type Rgb = [u8; 3];

/// Mid-gray used when no (or a malformed) fill color is supplied.
pub const DEFAULT_FILL: Rgb = [128, 128, 128];

/// Slack allowed on `x + width` and `y + height` for float rounding.
const CROP_TOLERANCE: f64 = 0.001;

const RESAMPLE: FilterType = FilterType::Lanczos3;

/// A normalized crop rectangle; every component lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    /// Pixel rectangle `(left, top, width, height)` on a `w`×`h` image.
    ///
    /// Coordinates truncate toward zero and are clamped so the rectangle is
    /// at least 1×1 and lies inside the image.
    pub fn pixel_rect(&self, w: u32, h: u32) -> (u32, u32, u32, u32) {
        let (wf, hf) = (w as f64, h as f64);
        let left = ((self.x * wf) as u32).min(w.saturating_sub(1));
        let top = ((self.y * hf) as u32).min(h.saturating_sub(1));
        let right = (((self.x + self.width) * wf) as u32).min(w).max(left + 1);
        let bottom = (((self.y + self.height) * hf) as u32).min(h).max(top + 1);
        (left, top, right - left, bottom - top)
    }
}

/// Validate a normalized crop.
///
/// Returns `None` ("no crop") unless `0≤x≤1`, `0≤y≤1`, `0<w≤1`, `0<h≤1`,
/// `x+w≤1.001` and `y+h≤1.001`. NaN components are rejected.
pub fn normalize_crop(x: f64, y: f64, width: f64, height: f64) -> Option<CropRegion> {
    let unit = 0.0..=1.0;
    let valid = unit.contains(&x)
        && unit.contains(&y)
        && width > 0.0
        && width <= 1.0
        && height > 0.0
        && height <= 1.0
        && x + width <= 1.0 + CROP_TOLERANCE
        && y + height <= 1.0 + CROP_TOLERANCE;

    valid.then_some(CropRegion {
        x,
        y,
        width,
        height,
    })
}

/// Cut the crop region out of an image.
pub fn apply_crop(img: &DynamicImage, region: &CropRegion) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (left, top, cw, ch) = region.pixel_rect(w, h);
    img.crop_imm(left, top, cw, ch)
}

/// Parse `#RRGGBB` (leading `#` optional, surrounding whitespace ignored).
///
/// Malformed input yields [`DEFAULT_FILL`].
pub fn parse_hex_color(s: &str) -> Rgb {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return DEFAULT_FILL;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(128);
    [channel(0), channel(2), channel(4)]
}

/// Parse a fill mode name, falling back to [`FillMode::Crop`] with a warning.
pub fn parse_fill_mode(s: &str) -> FillMode {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown fill mode {:?}, using crop", s);
        FillMode::Crop
    })
}

fn solid(width: u32, height: u32, fill: Rgb, alpha: bool) -> DynamicImage {
    let canvas = RgbaImage::from_pixel(width, height, Rgba([fill[0], fill[1], fill[2], 255]));
    finish(canvas, alpha)
}

fn finish(canvas: RgbaImage, alpha: bool) -> DynamicImage {
    let out = DynamicImage::ImageRgba8(canvas);
    if alpha {
        out
    } else {
        DynamicImage::ImageRgb8(out.to_rgb8())
    }
}

fn normalized(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn scaled_dim(src: u32, scale: f64) -> u32 {
    (src as f64 * scale).round() as u32
}

/// Centered source rectangle with the target's aspect ratio.
///
/// Returns the cover scale and `(left, top, width, height)` in source pixels.
fn cover_rect(sw: u32, sh: u32, tw: u32, th: u32) -> (f64, (u32, u32, u32, u32)) {
    let scale = (tw as f64 / sw as f64).max(th as f64 / sh as f64);
    let cw = ((tw as f64 / scale).round() as u32).clamp(1, sw);
    let ch = ((th as f64 / scale).round() as u32).clamp(1, sh);
    (scale, ((sw - cw) / 2, (sh - ch) / 2, cw, ch))
}

/// Center-crop in source space, then scale the crop to the target box.
///
/// Only the visible part of the source is ever resized, so the largest
/// buffer is the output itself whatever the source aspect ratio.
fn cover(img: &DynamicImage, tw: u32, th: u32) -> DynamicImage {
    let (sw, sh) = img.dimensions();
    let (_, (left, top, cw, ch)) = cover_rect(sw, sh, tw, th);
    normalized(&img.crop_imm(left, top, cw, ch).resize_exact(tw, th, RESAMPLE))
}

/// As [`cover`], blurring before the final trim.
///
/// The crop is widened by enough source pixels to feed the blur kernel at
/// the edges; the scaled margin is capped at `3 * sigma` before blurring.
fn cover_blurred(img: &DynamicImage, tw: u32, th: u32, sigma: f32) -> DynamicImage {
    let (sw, sh) = img.dimensions();
    let (scale, (left, top, cw, ch)) = cover_rect(sw, sh, tw, th);
    let reach = (3.0 * sigma as f64).ceil();
    let margin = (reach / scale).ceil() as u32;

    let el = left.saturating_sub(margin);
    let et = top.saturating_sub(margin);
    let er = (left + cw + margin).min(sw);
    let eb = (top + ch + margin).min(sh);

    let (sx, sy) = (tw as f64 / cw as f64, th as f64 / ch as f64);
    let pad = |px: u32, s: f64| (px as f64 * s).round() as u32;
    let (pl, pr) = (pad(left - el, sx), pad(er - left - cw, sx));
    let (pt, pb) = (pad(top - et, sy), pad(eb - top - ch, sy));

    let widened = img
        .crop_imm(el, et, er - el, eb - et)
        .resize_exact(tw + pl + pr, th + pt + pb, RESAMPLE);

    let cap = reach as u32;
    let (kl, kt) = (pl.min(cap), pt.min(cap));
    let kw = tw + kl + pr.min(cap);
    let kh = th + kt + pb.min(cap);
    let blurred = widened.crop_imm(pl - kl, pt - kt, kw, kh).blur(sigma);

    normalized(&blurred.crop_imm(kl, kt, tw, th))
}

/// Produce an image of exactly `tw`×`th`.
///
/// - `Crop`: scale so the source covers the box, center-crop the overflow.
///   The overflow is cut in source space before scaling.
/// - `Color`: scale so the source fits inside, center it on `fill`.
/// - `Blur`: as `Crop`, with a Gaussian blur of radius `min(tw, th) / 20`
///   applied before the final trim.
///
/// A source with zero area, or one that would scale to zero area, yields a
/// solid `fill` image of the target size.
pub fn resize_to_fit(
    img: &DynamicImage,
    tw: u32,
    th: u32,
    mode: FillMode,
    fill: Rgb,
) -> DynamicImage {
    let alpha = img.color().has_alpha();
    let (sw, sh) = img.dimensions();

    if sw == 0 || sh == 0 || tw == 0 || th == 0 {
        return solid(tw, th, fill, alpha);
    }
    if (sw, sh) == (tw, th) {
        return normalized(img);
    }

    match mode {
        FillMode::Crop => cover(img, tw, th),
        FillMode::Blur => match tw.min(th) / 20 {
            0 => cover(img, tw, th),
            radius => cover_blurred(img, tw, th, radius as f32),
        },
        FillMode::Color => {
            let scale = (tw as f64 / sw as f64).min(th as f64 / sh as f64);
            let nw = scaled_dim(sw, scale).min(tw);
            let nh = scaled_dim(sh, scale).min(th);
            if nw == 0 || nh == 0 {
                return solid(tw, th, fill, alpha);
            }

            let scaled = img.resize_exact(nw, nh, RESAMPLE).to_rgba8();
            let mut canvas = RgbaImage::from_pixel(tw, th, Rgba([fill[0], fill[1], fill[2], 255]));
            let x = ((tw - nw) / 2) as i64;
            let y = ((th - nh) / 2) as i64;
            imageops::overlay(&mut canvas, &scaled, x, y);
            finish(canvas, alpha)
        }
    }
}

/// Scale preserving aspect ratio.
///
/// With both targets the smaller ratio wins; with one, that ratio is used;
/// with neither, the image is returned unchanged. Dimensions are
/// `round(src * scale)`, floored at 1 pixel.
pub fn resize_keep_aspect(
    img: &DynamicImage,
    target_width: Option<u32>,
    target_height: Option<u32>,
) -> DynamicImage {
    let (sw, sh) = img.dimensions();
    if sw == 0 || sh == 0 {
        return img.clone();
    }

    let ratio = |target: u32, src: u32| target as f64 / src as f64;
    let scale = match (target_width, target_height) {
        (Some(tw), Some(th)) => ratio(tw, sw).min(ratio(th, sh)),
        (Some(tw), None) => ratio(tw, sw),
        (None, Some(th)) => ratio(th, sh),
        (None, None) => return img.clone(),
    };

    let nw = scaled_dim(sw, scale).max(1);
    let nh = scaled_dim(sh, scale).max(1);
    if (nw, nh) == (sw, sh) {
        return img.clone();
    }
    img.resize_exact(nw, nh, RESAMPLE)
}
