//! Aspect-preserving resize with ratio-based filter selection.

use image::{DynamicImage, GenericImageView};

/// Select a resampling filter based on how far we're downscaling.
///
/// Large reductions tolerate a cheaper filter; near-1:1 resizes get Lanczos3
/// to keep detail.
pub fn select_filter(
    orig_width: u32,
    orig_height: u32,
    new_width: u32,
    new_height: u32,
) -> image::imageops::FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        image::imageops::FilterType::Triangle
    } else if max_ratio > 1.5 {
        image::imageops::FilterType::CatmullRom
    } else {
        image::imageops::FilterType::Lanczos3
    }
}

/// Target dimensions for a width-bounded resize that preserves aspect ratio
/// and never upscales.
pub fn fit_to_width(orig_width: u32, orig_height: u32, target_width: u32) -> (u32, u32) {
    if target_width >= orig_width {
        return (orig_width, orig_height);
    }
    let aspect_ratio = orig_height as f32 / orig_width as f32;
    let height = (target_width as f32 * aspect_ratio).round() as u32;
    (target_width, height.max(1))
}

/// Resize to fit within `target_width`, preserving aspect ratio. Returns the
/// original image untouched when the target is not smaller than the source.
pub fn resize_to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    let (width, height) = fit_to_width(orig_width, orig_height, target_width);
    if (width, height) == (orig_width, orig_height) {
        return img.clone();
    }
    let filter = select_filter(orig_width, orig_height, width, height);
    img.resize_exact(width, height, filter)
}

/// Bound the longest edge to `max_dimension`, preserving aspect ratio, never
/// upscaling. Used by the optimistic preview.
pub fn fit_longest_edge(orig_width: u32, orig_height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = orig_width.max(orig_height);
    if longest <= max_dimension {
        return (orig_width, orig_height);
    }
    let scale = max_dimension as f32 / longest as f32;
    let width = ((orig_width as f32 * scale).round() as u32).max(1);
    let height = ((orig_height as f32 * scale).round() as u32).max(1);
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_fit_to_width_downscale() {
        assert_eq!(fit_to_width(4000, 3000, 1000), (1000, 750));
        assert_eq!(fit_to_width(3000, 4000, 1500), (1500, 2000));
    }

    #[test]
    fn test_fit_to_width_never_upscales() {
        assert_eq!(fit_to_width(800, 600, 2000), (800, 600));
        assert_eq!(fit_to_width(800, 600, 800), (800, 600));
    }

    #[test]
    fn test_fit_to_width_extreme_aspect() {
        // Panorama with a tiny height still rounds to at least 1px.
        assert_eq!(fit_to_width(10_000, 20, 100).1, 1);
    }

    #[test]
    fn test_select_filter_by_ratio() {
        assert_eq!(
            select_filter(4000, 3000, 1000, 750),
            image::imageops::FilterType::Triangle
        );
        assert_eq!(
            select_filter(1600, 1200, 1000, 750),
            image::imageops::FilterType::CatmullRom
        );
        assert_eq!(
            select_filter(1100, 825, 1000, 750),
            image::imageops::FilterType::Lanczos3
        );
    }

    #[test]
    fn test_fit_longest_edge() {
        assert_eq!(fit_longest_edge(4000, 3000, 320), (320, 240));
        assert_eq!(fit_longest_edge(3000, 4000, 320), (240, 320));
        assert_eq!(fit_longest_edge(200, 100, 320), (200, 100));
    }

    #[test]
    fn test_resize_to_width() {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 50, Rgba([10, 20, 30, 255])));
        let resized = resize_to_width(&img, 50);
        assert_eq!(resized.dimensions(), (50, 25));

        // No upscale: image comes back at original size.
        let same = resize_to_width(&img, 500);
        assert_eq!(same.dimensions(), (100, 50));
    }
}
