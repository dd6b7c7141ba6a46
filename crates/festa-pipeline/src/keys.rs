//! Object-store key layout.
//!
//! Keys are deterministic functions of the media id so the retry path can
//! re-derive them without carrying extra state in the database.

use festa_core::AppError;
use uuid::Uuid;

/// Staging key for the original bytes between request and background job.
pub fn staging_key(media_id: Uuid, extension: &str) -> String {
    format!("staging/{}.{}", media_id, extension)
}

/// Permanent key for the original upload.
pub fn original_key(event_id: Uuid, media_id: Uuid, extension: &str) -> String {
    format!("events/{}/media/{}/original.{}", event_id, media_id, extension)
}

/// Permanent key for one generated variant.
pub fn variant_key(event_id: Uuid, media_id: Uuid, name: &str, extension: &str) -> String {
    format!("events/{}/media/{}/{}.{}", event_id, media_id, name, extension)
}

/// Key for the short-lived optimistic preview.
pub fn preview_key(event_id: Uuid, media_id: Uuid) -> String {
    format!("events/{}/previews/{}.webp", event_id, media_id)
}

/// File extension for a stored object, preferring the filename's own
/// extension and falling back to the content type.
pub fn extension_for(filename: &str, content_type: &str) -> String {
    if let Some(ext) = filename.rsplit_once('.').map(|(_, e)| e) {
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_ascii_lowercase();
        }
    }
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
    .to_string()
}

/// Strip path components and unsafe characters from a client filename.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    // Check the raw input: `Path::file_name` would already have swallowed
    // a traversal like "foo/../bar".
    if filename.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let filename_only = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() || sanitized.len() < 3 {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout_is_deterministic() {
        let event = Uuid::new_v4();
        let media = Uuid::new_v4();
        assert_eq!(
            original_key(event, media, "jpg"),
            format!("events/{}/media/{}/original.jpg", event, media)
        );
        assert_eq!(staging_key(media, "jpg"), staging_key(media, "jpg"));
        assert!(preview_key(event, media).ends_with(".webp"));
    }

    #[test]
    fn test_extension_prefers_filename() {
        assert_eq!(extension_for("beach.JPG", "image/png"), "jpg");
        assert_eq!(extension_for("noext", "image/jpeg"), "jpg");
        assert_eq!(extension_for("weird.tar.gz.backup", "video/mp4"), "mp4");
        assert_eq!(extension_for("x", "application/octet-stream"), "bin");
    }

    #[test]
    fn test_sanitize_filename_rejects_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("foo/../bar").is_err());
        assert!(sanitize_filename("../../etc/passwd").is_err());
    }

    #[test]
    fn test_sanitize_filename_accepts_valid_names() {
        assert_eq!(sanitize_filename("image.png").unwrap(), "image.png");
        assert_eq!(sanitize_filename("album/photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_filename("my photo!.jpg").unwrap(), "my_photo_.jpg");
        assert_eq!(sanitize_filename("a").unwrap(), "file");
    }
}
