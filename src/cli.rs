use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mediaconv::config::Config;
use mediaconv::conversion::{ConversionOptions, SizePreset};
use mediaconv::geometry::{normalize_crop, parse_fill_mode, parse_hex_color, CropRegion};
use mediaconv_common::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaconv")]
#[command(author, version, about = "Image and video conversion with batch archiving")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert files one by one and report each task
    Convert {
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        options: ConversionArgs,
    },

    /// Convert files as one batch and zip the outputs
    Batch {
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Archive layout: flat, by_file or by_format
        #[arg(long, default_value = "flat")]
        layout: String,

        #[command(flatten)]
        options: ConversionArgs,
    },

    /// Show a stored batch record
    BatchStatus {
        /// Batch id
        batch_id: String,
    },

    /// List the named size presets
    Presets,

    /// List supported input extensions and output formats
    Formats,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Conversion flags shared by `convert` and `batch`.
#[derive(Args, Debug, Clone)]
pub struct ConversionArgs {
    /// Output formats (webp, jpeg, png, avif, mp4, webm)
    #[arg(short, long = "format", value_delimiter = ',', default_value = "webp")]
    pub formats: Vec<String>,

    /// Size presets: a preset name, WxH, Wx, xH or original
    #[arg(short, long = "size", value_delimiter = ',', default_value = "original")]
    pub sizes: Vec<String>,

    /// How to reach an exact size: crop, color or blur
    #[arg(long, default_value = "crop")]
    pub fill_mode: String,

    /// Padding color for the color fill mode (#RRGGBB)
    #[arg(long, default_value = "#808080")]
    pub fill_color: String,

    /// Target size reduction in percent (0-80), overrides quality
    #[arg(long)]
    pub reduce: Option<u8>,

    /// Drop EXIF and ICC metadata from outputs
    #[arg(long)]
    pub strip_metadata: bool,

    /// Progressive JPEG scans
    #[arg(long)]
    pub progressive: bool,

    /// Maximum encoder effort
    #[arg(long)]
    pub aggressive: bool,

    /// Use the web-optimized quality and effort
    #[arg(long)]
    pub web_optimized: bool,

    /// Crop region as fractions: x,y,width,height
    #[arg(long, allow_hyphen_values = true)]
    pub crop: Option<String>,
}

impl ConversionArgs {
    /// Resolve the flags into engine options.
    pub fn to_options(&self, config: &Config) -> Result<ConversionOptions> {
        let formats = self
            .formats
            .iter()
            .map(|f| f.parse::<OutputFormat>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Invalid --format")?;

        let crop = match self.crop {
            Some(ref raw) => Some(parse_crop(raw)?),
            None => None,
        };

        Ok(ConversionOptions {
            formats,
            sizes: SizePreset::parse_list(&self.sizes, &config.presets),
            fill_mode: parse_fill_mode(&self.fill_mode),
            fill_color: parse_hex_color(&self.fill_color),
            size_reduction_percent: self.reduce,
            strip_metadata: self.strip_metadata,
            progressive: self.progressive,
            aggressive: self.aggressive,
            web_optimized: self.web_optimized,
            crop,
        })
    }
}

fn parse_crop(raw: &str) -> Result<CropRegion> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid --crop {:?}", raw))?;

    match values.as_slice() {
        [x, y, w, h] => normalize_crop(*x, *y, *w, *h)
            .with_context(|| format!("Crop region {:?} is outside the image", raw)),
        _ => anyhow::bail!("--crop takes four values: x,y,width,height"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaconv::geometry::DEFAULT_FILL;
    use mediaconv_common::FillMode;

    fn parse(args: &[&str]) -> ConversionArgs {
        let mut argv = vec!["mediaconv", "convert", "in.png"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Convert { options, .. } => options,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]).to_options(&Config::default()).unwrap();
        assert_eq!(options.formats, vec![OutputFormat::Webp]);
        assert_eq!(options.sizes, vec![SizePreset::original()]);
        assert_eq!(options.fill_mode, FillMode::Crop);
        assert_eq!(options.fill_color, DEFAULT_FILL);
        assert!(options.crop.is_none());
    }

    #[test]
    fn test_comma_separated_and_repeated() {
        let options = parse(&["-f", "webp,JPG", "-f", "png", "-s", "800x600,instagram_story"])
            .to_options(&Config::default())
            .unwrap();
        assert_eq!(
            options.formats,
            vec![OutputFormat::Webp, OutputFormat::Jpeg, OutputFormat::Png]
        );
        assert_eq!(options.sizes.len(), 2);
        assert_eq!(options.sizes[1].suffix(), "1080x1920");
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(parse(&["-f", "gif"]).to_options(&Config::default()).is_err());
    }

    #[test]
    fn test_crop_flag() {
        let options = parse(&["--crop", "0.1,0.2,0.5,0.5"])
            .to_options(&Config::default())
            .unwrap();
        let crop = options.crop.unwrap();
        assert!((crop.x - 0.1).abs() < 1e-9);
        assert!((crop.height - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_bounds_crop_rejected() {
        assert!(parse(&["--crop", "0.6,0,0.6,1"]).to_options(&Config::default()).is_err());
        assert!(parse(&["--crop", "0.1,0.1"]).to_options(&Config::default()).is_err());
    }

    #[test]
    fn test_fill_color_and_mode() {
        let options = parse(&["--fill-mode", "color", "--fill-color", "#FF0000", "--reduce", "50"])
            .to_options(&Config::default())
            .unwrap();
        assert_eq!(options.fill_mode, FillMode::Color);
        assert_eq!(options.fill_color, [255, 0, 0]);
        assert_eq!(options.size_reduction_percent, Some(50));
    }
}
