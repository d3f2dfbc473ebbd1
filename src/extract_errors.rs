//! # Extraction Error Types Module
//!
//! Structured errors for the document extraction pipeline. Every variant is
//! caught at the file step and turned into a user-facing message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// File extension is neither PDF nor DOCX
    #[error("unsupported document format: {0}")]
    UnsupportedKind(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Document could not be opened or its page tree is broken
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("DOCX error: {0}")]
    Docx(String),
    /// Page rendering failed or produced an unusable raster
    #[error("rasterize error on page {page}: {message}")]
    Rasterize { page: u32, message: String },
    /// Tesseract initialisation or recognition failed
    #[error("OCR error: {0}")]
    Ocr(String),
    #[error("extraction timed out after {0} seconds")]
    Timeout(u64),
    /// The blocking extraction task panicked or was cancelled
    #[error("extraction task failed: {0}")]
    TaskFailed(String),
}

impl From<lopdf::Error> for ExtractError {
    fn from(err: lopdf::Error) -> Self {
        ExtractError::Pdf(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        ExtractError::Docx(err.to_string())
    }
}

impl From<quick_xml::Error> for ExtractError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractError::Docx(err.to_string())
    }
}

impl ExtractError {
    /// Localization key for the user-facing message
    pub fn message_key(&self) -> &'static str {
        match self {
            ExtractError::UnsupportedKind(_) => "error-unsupported-format",
            ExtractError::Timeout(_) => "error-extraction-timeout",
            ExtractError::Ocr(_) | ExtractError::Rasterize { .. } => "error-ocr",
            _ => "error-extraction",
        }
    }
}
