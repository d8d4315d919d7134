//! Size preset vocabulary.
//!
//! A size label is one of:
//! - `original`: no resize
//! - a named preset from [`BUILTIN_PRESETS`] or the `[presets]` config table
//! - `WxH`, `Wx` or `xH` with each dimension in `1..=MAX_DIMENSION`
//!
//! Anything else is dropped with a warning.

use serde::Serialize;
use std::collections::BTreeMap;

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 4096;

/// Label of the "no resize" preset.
pub const ORIGINAL: &str = "original";

/// Built-in social/ads presets.
pub const BUILTIN_PRESETS: &[(&str, u32, u32)] = &[
    ("instagram_square", 1080, 1080),
    ("instagram_portrait", 1080, 1350),
    ("instagram_story", 1080, 1920),
    ("facebook_post", 1200, 630),
    ("twitter_post", 1200, 675),
    ("linkedin_banner", 1200, 627),
    ("linkedin_background", 1584, 396),
    ("pinterest", 1000, 1500),
    ("youtube_thumbnail", 1280, 720),
    ("google_display", 1200, 628),
];

/// A resolved target size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizePreset {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub label: String,
}

impl SizePreset {
    /// The "no resize" preset.
    pub fn original() -> Self {
        Self {
            width: None,
            height: None,
            label: ORIGINAL.to_string(),
        }
    }

    pub fn is_original(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Filename suffix: `WxH`, `Wx`, `xH` or `original`.
    pub fn suffix(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            (Some(w), None) => format!("{w}x"),
            (None, Some(h)) => format!("x{h}"),
            (None, None) => ORIGINAL.to_string(),
        }
    }

    /// Resolve a list of labels.
    ///
    /// Labels are trimmed, lowercased and de-duplicated in first-seen order.
    /// Presets resolving to the same [`suffix`](Self::suffix) would share an
    /// output filename, so only the first of them is kept. `extra` presets
    /// override built-ins of the same name. An empty result yields
    /// `[original]`.
    pub fn parse_list(labels: &[String], extra: &BTreeMap<String, [u32; 2]>) -> Vec<SizePreset> {
        let mut seen: Vec<String> = Vec::new();
        let mut result = Vec::new();

        for raw in labels {
            let label = raw.trim().to_lowercase();
            if seen.contains(&label) {
                continue;
            }

            match Self::parse(&label, extra) {
                Some(preset) => {
                    seen.push(label);
                    result.push(preset);
                }
                None => tracing::warn!("Dropping unrecognized size preset {:?}", raw),
            }
        }

        let mut result = dedup_by_suffix(result);
        if result.is_empty() {
            result.push(Self::original());
        }
        result
    }

    /// Resolve one normalized label.
    fn parse(label: &str, extra: &BTreeMap<String, [u32; 2]>) -> Option<SizePreset> {
        if label == ORIGINAL {
            return Some(Self::original());
        }

        if is_dimension_syntax(label) {
            let (w, h) = label.split_once('x')?;
            let width = parse_dimension(w)?;
            let height = parse_dimension(h)?;
            if width.is_none() && height.is_none() {
                return None;
            }
            return Some(SizePreset {
                width,
                height,
                label: label.to_string(),
            });
        }

        lookup_named(label, extra).map(|(w, h)| SizePreset {
            width: Some(w),
            height: Some(h),
            label: label.to_string(),
        })
    }
}

/// Keep the first preset for each filename suffix.
pub fn dedup_by_suffix(presets: Vec<SizePreset>) -> Vec<SizePreset> {
    let mut suffixes: Vec<String> = Vec::new();
    presets
        .into_iter()
        .filter(|preset| {
            let suffix = preset.suffix();
            if suffixes.contains(&suffix) {
                tracing::debug!(label = %preset.label, "Skipping preset with duplicate size {}", suffix);
                false
            } else {
                suffixes.push(suffix);
                true
            }
        })
        .collect()
}

/// Digits and exactly one `x`.
fn is_dimension_syntax(label: &str) -> bool {
    label.matches('x').count() == 1 && label.chars().all(|c| c.is_ascii_digit() || c == 'x')
}

/// `Some(None)` for an empty side, `Some(Some(n))` for an in-range number,
/// `None` when out of range.
fn parse_dimension(s: &str) -> Option<Option<u32>> {
    if s.is_empty() {
        return Some(None);
    }
    let n: u32 = s.parse().ok()?;
    (1..=MAX_DIMENSION).contains(&n).then_some(Some(n))
}

fn lookup_named(name: &str, extra: &BTreeMap<String, [u32; 2]>) -> Option<(u32, u32)> {
    if let Some([w, h]) = extra.get(name) {
        return Some((*w, *h));
    }
    BUILTIN_PRESETS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, w, h)| (*w, *h))
}

/// All named presets, built-ins first, config overrides applied.
pub fn all_presets(extra: &BTreeMap<String, [u32; 2]>) -> Vec<(String, u32, u32)> {
    let mut table: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for (name, w, h) in BUILTIN_PRESETS {
        table.insert(name.to_string(), (*w, *h));
        order.push(name.to_string());
    }
    for (name, [w, h]) in extra {
        if table.insert(name.clone(), (*w, *h)).is_none() {
            order.push(name.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|name| table.get(&name).map(|(w, h)| (name.clone(), *w, *h)))
        .collect()
}
