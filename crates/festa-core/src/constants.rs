//! Shared constants for upload validation, preview generation, and
//! download-size estimation.

/// Default maximum upload size (50 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Content types accepted by the synchronous upload path.
pub const ALLOWED_IMAGE_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
];

pub const ALLOWED_VIDEO_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
];

/// Longest edge of the optimistic preview. Small enough that decode + encode
/// + temp upload stays well inside the request/response cycle.
pub const PREVIEW_MAX_DIMENSION: u32 = 320;

/// WebP quality for the optimistic preview. Deliberately aggressive; the
/// preview is replaced by real variants minutes later.
pub const PREVIEW_QUALITY: f32 = 40.0;

/// Approximate encoded-size ratio of each variant relative to the original
/// upload, used only for estimated-download-size display. Actual measured
/// sizes are persisted per variant; nothing invariant-bearing reads these.
pub const VARIANT_SIZE_RATIOS: &[(&str, f64)] = &[
    ("small", 0.03),
    ("medium", 0.10),
    ("large", 0.35),
];

/// Estimate the total download size for one original at a given variant tier.
pub fn estimated_variant_size(original_bytes: i64, variant_name: &str) -> i64 {
    VARIANT_SIZE_RATIOS
        .iter()
        .find(|(name, _)| *name == variant_name)
        .map(|(_, ratio)| (original_bytes as f64 * ratio).round() as i64)
        .unwrap_or(original_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_variant_size() {
        assert_eq!(estimated_variant_size(10_000_000, "small"), 300_000);
        assert_eq!(estimated_variant_size(10_000_000, "medium"), 1_000_000);
        assert_eq!(estimated_variant_size(10_000_000, "large"), 3_500_000);
        // Unknown tier falls back to the original size.
        assert_eq!(estimated_variant_size(10_000_000, "original"), 10_000_000);
    }
}
