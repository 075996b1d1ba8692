//! Error types for the redaction engine.
//!
//! Errors are split by how the caller is expected to react: anything
//! surfaced here aborts the current operation. Degraded paths (missing
//! orientation detector, failed page copy) never produce a
//! `RedactorError`; they are logged and replaced by a safe default.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for redaction operations.
pub type RedactorResult<T> = Result<T, RedactorError>;

/// Error type for all engine operations.
#[derive(Debug, Error)]
pub enum RedactorError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document could not be opened by the page renderer
    #[error("Failed to open document: {message}")]
    DocumentOpen { message: String },

    /// Rendering or text extraction failed for a page
    #[error("Render error on page {page}: {message}")]
    Render { page: usize, message: String },

    /// The OCR pool could not be brought up
    #[error("OCR pool initialization failed: {message}")]
    OcrInit { message: String },

    /// Recognition failed for a page
    #[error("OCR failed on page {page}: {message}")]
    Ocr { page: usize, message: String },

    /// The document writer rejected an operation
    #[error("Document writer error: {message}")]
    Writer {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid configuration or parameters
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },

    /// Backend-specific error (MuPDF, lopdf, image codecs, ...)
    #[error("{backend} backend error: {message}")]
    BackendError {
        backend: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RedactorError {
    pub(crate) fn invalid_input(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn render(page: usize, message: impl ToString) -> Self {
        Self::Render {
            page,
            message: message.to_string(),
        }
    }
}

impl From<io::Error> for RedactorError {
    fn from(err: io::Error) -> Self {
        Self::BackendError {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<lopdf::Error> for RedactorError {
    fn from(err: lopdf::Error) -> Self {
        Self::Writer {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for RedactorError {
    fn from(err: image::ImageError) -> Self {
        Self::BackendError {
            backend: "image".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for RedactorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            parameter: "json".to_string(),
            reason: err.to_string(),
        }
    }
}
