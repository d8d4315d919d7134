//! EXIF and ICC carry-over between source and encoded output.
//!
//! Only container chunks are touched; the encoded pixel stream is left as is.

use anyhow::Result;
use bytes::Bytes;
use img_parts::{DynImage, ImageEXIF, ImageICC};
use mediaconv_common::OutputFormat;

/// Metadata read from a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    pub exif: Option<Bytes>,
    pub icc: Option<Bytes>,
}

impl SourceMetadata {
    /// Read EXIF/ICC from a JPEG, PNG or WebP file's bytes.
    ///
    /// Other containers (or unparsable data) yield empty metadata.
    pub fn read(data: &[u8]) -> Self {
        match DynImage::from_bytes(Bytes::copy_from_slice(data)) {
            Ok(Some(image)) => Self {
                exif: image.exif(),
                icc: image.icc_profile(),
            },
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.icc.is_none()
    }
}

/// Whether the output container can carry EXIF/ICC chunks.
pub fn supports_metadata(format: OutputFormat) -> bool {
    matches!(
        format,
        OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::Webp
    )
}

/// Rewrite the metadata chunks of an encoded image.
///
/// With `metadata == None` any EXIF/ICC chunk is removed; otherwise the
/// source's chunks replace whatever the encoder wrote.
pub fn apply(encoded: Vec<u8>, format: OutputFormat, metadata: Option<&SourceMetadata>) -> Result<Vec<u8>> {
    if !supports_metadata(format) {
        return Ok(encoded);
    }
    if metadata.is_some_and(SourceMetadata::is_empty) {
        return Ok(encoded);
    }

    let Some(mut image) = DynImage::from_bytes(Bytes::from(encoded.clone()))? else {
        return Ok(encoded);
    };

    match metadata {
        Some(meta) => {
            image.set_exif(meta.exif.clone());
            image.set_icc_profile(meta.icc.clone());
        }
        None => {
            image.set_exif(None);
            image.set_icc_profile(None);
        }
    }

    Ok(image.encoder().bytes().to_vec())
}
