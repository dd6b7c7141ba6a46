//! Festa Processing Library
//!
//! Pure, CPU-bound image work: metadata extraction, resizing, encoding,
//! variant generation, and the optimistic preview. No I/O besides the pixel
//! transforms themselves; callers run these under `spawn_blocking`.

pub mod encode;
pub mod metadata;
pub mod preview;
pub mod resize;
pub mod variants;

pub use metadata::extract_image_metadata;
pub use preview::generate_preview;
pub use variants::{
    decode_image, generate_variants, generate_variants_concurrent, ProcessedVariant, VariantFormat,
    VariantSpec, DEFAULT_VARIANT_SPECS,
};

/// Errors from the pure image-processing layer.
///
/// `CorruptInput` and `UnsupportedDimensions` are terminal: the bytes won't
/// get better on retry.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    #[error("Source dimensions could not be read")]
    UnsupportedDimensions,

    #[error("Encoding failed ({format}): {message}")]
    Encode { format: String, message: String },
}

impl From<ProcessingError> for festa_core::AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::CorruptInput(msg) => festa_core::AppError::CorruptInput(msg),
            ProcessingError::UnsupportedDimensions => {
                festa_core::AppError::CorruptInput("source dimensions unreadable".to_string())
            }
            ProcessingError::Encode { format, message } => festa_core::AppError::ImageProcessing(
                format!("{} encoding failed: {}", format, message),
            ),
        }
    }
}
