//! Optimistic preview generation.
//!
//! Runs inside the synchronous upload request, so it is bounded to a small
//! output dimension and aggressive compression. The preview is deleted once
//! the real variants are live.

use bytes::Bytes;
use image::GenericImageView;

use festa_core::constants::{PREVIEW_MAX_DIMENSION, PREVIEW_QUALITY};

use crate::encode::encode_webp;
use crate::resize::{fit_longest_edge, select_filter};
use crate::variants::decode_image;
use crate::ProcessingError;

/// A rendered preview plus its dimensions.
#[derive(Debug, Clone)]
pub struct Preview {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Decode, bound the longest edge, and encode a low-quality WebP.
pub fn generate_preview(data: &[u8]) -> Result<Preview, ProcessingError> {
    generate_preview_with(data, PREVIEW_MAX_DIMENSION, PREVIEW_QUALITY)
}

pub fn generate_preview_with(
    data: &[u8],
    max_dimension: u32,
    quality: f32,
) -> Result<Preview, ProcessingError> {
    let img = decode_image(data)?;
    let (orig_width, orig_height) = img.dimensions();
    let (width, height) = fit_longest_edge(orig_width, orig_height, max_dimension);

    let resized = if (width, height) == (orig_width, orig_height) {
        img
    } else {
        let filter = select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    };

    let bytes = encode_webp(&resized, quality)?;
    Ok(Preview {
        bytes,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn source_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 100, 50, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .unwrap();
        buf
    }

    #[test]
    fn test_preview_bounds_longest_edge() {
        let preview = generate_preview(&source_png(4000, 2000)).unwrap();
        assert_eq!(preview.width, PREVIEW_MAX_DIMENSION);
        assert_eq!(preview.height, PREVIEW_MAX_DIMENSION / 2);
        assert!(!preview.bytes.is_empty());
    }

    #[test]
    fn test_small_source_not_upscaled() {
        let preview = generate_preview(&source_png(100, 80)).unwrap();
        assert_eq!((preview.width, preview.height), (100, 80));
    }

    #[test]
    fn test_corrupt_input_fails() {
        assert!(matches!(
            generate_preview(b"garbage"),
            Err(ProcessingError::CorruptInput(_))
        ));
    }
}
