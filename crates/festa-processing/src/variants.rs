//! Variant generation: a fixed set of (size, format) encodings per upload.
//!
//! All-or-nothing by contract: if any one variant fails to encode, the whole
//! set fails and nothing is persisted, so a completed record can never carry
//! a partially-populated variant set.

use bytes::Bytes;
use futures::future::try_join_all;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::sync::Arc;

use crate::encode::{encode_jpeg, encode_webp};
use crate::resize::resize_to_width;
use crate::ProcessingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFormat {
    Webp,
    Jpeg,
}

impl VariantFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VariantFormat::Webp => "webp",
            VariantFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            VariantFormat::Webp => "image/webp",
            VariantFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VariantFormat::Webp => "webp",
            VariantFormat::Jpeg => "jpg",
        }
    }
}

/// One target encoding: name, bounding width, format, quality.
#[derive(Debug, Clone, Copy)]
pub struct VariantSpec {
    pub name: &'static str,
    pub width: u32,
    pub format: VariantFormat,
    pub quality: f32,
}

/// The default variant table: three widths in a modern format plus a lossy
/// fallback. JPEG runs slightly higher quality to compensate for the older
/// codec.
pub const DEFAULT_VARIANT_SPECS: [VariantSpec; 6] = [
    VariantSpec { name: "small", width: 400, format: VariantFormat::Webp, quality: 75.0 },
    VariantSpec { name: "small", width: 400, format: VariantFormat::Jpeg, quality: 78.0 },
    VariantSpec { name: "medium", width: 1000, format: VariantFormat::Webp, quality: 80.0 },
    VariantSpec { name: "medium", width: 1000, format: VariantFormat::Jpeg, quality: 82.0 },
    VariantSpec { name: "large", width: 2000, format: VariantFormat::Webp, quality: 85.0 },
    VariantSpec { name: "large", width: 2000, format: VariantFormat::Jpeg, quality: 88.0 },
];

/// The (name, format) pairs a completed record must carry.
pub fn expected_variant_pairs(specs: &[VariantSpec]) -> Vec<(&'static str, &'static str)> {
    specs.iter().map(|s| (s.name, s.format.as_str())).collect()
}

/// One generated variant, ready for upload.
#[derive(Debug, Clone)]
pub struct ProcessedVariant {
    pub name: String,
    pub format: VariantFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Bytes,
}

impl ProcessedVariant {
    pub fn size_bytes(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// Decode source bytes, failing terminally on corrupt input.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, ProcessingError> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::CorruptInput(e.to_string()))?;
    let img = reader
        .decode()
        .map_err(|e| ProcessingError::CorruptInput(e.to_string()))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ProcessingError::UnsupportedDimensions);
    }
    Ok(img)
}

fn generate_one(img: &DynamicImage, spec: &VariantSpec) -> Result<ProcessedVariant, ProcessingError> {
    let resized = resize_to_width(img, spec.width);
    let (width, height) = resized.dimensions();
    let bytes = match spec.format {
        VariantFormat::Webp => encode_webp(&resized, spec.quality)?,
        VariantFormat::Jpeg => encode_jpeg(&resized, spec.quality)?,
    };
    Ok(ProcessedVariant {
        name: spec.name.to_string(),
        format: spec.format,
        width,
        height,
        bytes,
    })
}

/// Generate every variant sequentially. Pure and synchronous; callers that
/// care about wall-clock time use `generate_variants_concurrent`.
pub fn generate_variants(
    data: &[u8],
    specs: &[VariantSpec],
) -> Result<Vec<ProcessedVariant>, ProcessingError> {
    let img = decode_image(data)?;
    specs.iter().map(|spec| generate_one(&img, spec)).collect()
}

/// Generate every variant concurrently: decode once, then fan out one
/// blocking task per spec and join. Output order matches `specs` order.
pub async fn generate_variants_concurrent(
    data: Bytes,
    specs: &[VariantSpec],
) -> Result<Vec<ProcessedVariant>, ProcessingError> {
    let img = tokio::task::spawn_blocking(move || decode_image(&data))
        .await
        .map_err(|e| ProcessingError::CorruptInput(format!("decode task panicked: {}", e)))??;
    let img = Arc::new(img);

    let tasks = specs.iter().map(|spec| {
        let img = Arc::clone(&img);
        let spec = *spec;
        tokio::task::spawn_blocking(move || generate_one(&img, &spec))
    });

    let joined = try_join_all(tasks).await.map_err(|e| ProcessingError::Encode {
        format: "variant".to_string(),
        message: format!("encode task panicked: {}", e),
    })?;

    joined.into_iter().collect()
}
