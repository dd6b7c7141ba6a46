//! Image encoders: progressive JPEG via mozjpeg, lossy WebP via libwebp.

use bytes::Bytes;
use image::DynamicImage;

use crate::ProcessingError;

/// Encode to progressive JPEG with optimized coding.
pub fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, ProcessingError> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let encode = || -> anyhow::Result<Vec<u8>> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        Ok(comp.finish()?)
    };

    encode()
        .map(Bytes::from)
        .map_err(|e| ProcessingError::Encode {
            format: "jpeg".to_string(),
            message: e.to_string(),
        })
}

/// Encode to lossy WebP.
pub fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, ProcessingError> {
    let rgba_img = img.to_rgba8();
    let (width, height) = rgba_img.dimensions();

    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder.encode(quality);

    if webp_data.is_empty() {
        return Err(ProcessingError::Encode {
            format: "webp".to_string(),
            message: "encoder produced no output".to_string(),
        });
    }

    Ok(Bytes::copy_from_slice(&webp_data))
}
