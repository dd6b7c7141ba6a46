//! Metadata extraction from original upload bytes.
//!
//! Dimensions and container format come from decoding; camera and location
//! come from EXIF when present. EXIF problems never fail a job — only
//! undecodable pixels do.

use std::io::Cursor;

use exif::{In, Tag, Value};
use festa_core::models::MediaMetadata;
use image::GenericImageView;

use crate::ProcessingError;

/// Extract dimensions, format, and EXIF camera/location data.
///
/// Fails with `CorruptInput` when the bytes cannot be decoded at all; this
/// is the terminal failure that marks the media record failed regardless of
/// remaining attempts.
pub fn extract_image_metadata(data: &[u8]) -> Result<MediaMetadata, ProcessingError> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::CorruptInput(e.to_string()))?;
    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let img = reader
        .decode()
        .map_err(|e| ProcessingError::CorruptInput(e.to_string()))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ProcessingError::UnsupportedDimensions);
    }

    let mut metadata = MediaMetadata {
        width: Some(width),
        height: Some(height),
        aspect_ratio: Some(width as f64 / height as f64),
        format,
        ..Default::default()
    };

    if let Some(exif) = read_exif(data) {
        metadata.camera_make = ascii_field(&exif, Tag::Make);
        metadata.camera_model = ascii_field(&exif, Tag::Model);
        metadata.taken_at = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .map(|f| f.display_value().to_string());
        metadata.latitude = gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
        metadata.longitude = gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);
    }

    Ok(metadata)
}

fn read_exif(data: &[u8]) -> Option<exif::Exif> {
    let mut cursor = std::io::BufReader::new(Cursor::new(data));
    exif::Reader::new().read_from_container(&mut cursor).ok()
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) if !values.is_empty() => {
            let s = String::from_utf8_lossy(&values[0]).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

/// Convert a degrees/minutes/seconds rational triple plus its hemisphere
/// reference into a signed decimal coordinate.
fn gps_coordinate(exif: &exif::Exif, tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let rationals = match &field.value {
        Value::Rational(v) if v.len() == 3 => v,
        _ => return None,
    };

    let degrees = rationals[0].to_f64();
    let minutes = rationals[1].to_f64();
    let seconds = rationals[2].to_f64();
    let mut coordinate = degrees + minutes / 60.0 + seconds / 3600.0;

    if let Some(reference) = exif.get_field(ref_tag, In::PRIMARY) {
        let reference = reference.display_value().to_string();
        if reference.contains('S') || reference.contains('W') {
            coordinate = -coordinate;
        }
    }

    Some(coordinate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn plain_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([1, 2, 3, 255]),
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
    fn test_dimensions_and_aspect_ratio() {
        let metadata = extract_image_metadata(&plain_png(1600, 900)).unwrap();
        assert_eq!(metadata.width, Some(1600));
        assert_eq!(metadata.height, Some(900));
        assert!((metadata.aspect_ratio.unwrap() - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(metadata.format.as_deref(), Some("png"));
    }

    #[test]
    fn test_no_exif_leaves_camera_fields_empty() {
        let metadata = extract_image_metadata(&plain_png(10, 10)).unwrap();
        assert_eq!(metadata.camera_make, None);
        assert_eq!(metadata.camera_model, None);
        assert_eq!(metadata.latitude, None);
    }

    #[test]
    fn test_corrupt_bytes_fail_terminally() {
        assert!(matches!(
            extract_image_metadata(&[0u8; 32]),
            Err(ProcessingError::CorruptInput(_))
        ));
    }
}
