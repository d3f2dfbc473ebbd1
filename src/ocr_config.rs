//! # OCR Configuration Module
//!
//! This module defines configuration for the OCR fallback used on PDF pages
//! without a text layer: language set, raster resolution and raster limits.

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng+vie";
pub const DEFAULT_DPI: u32 = 300;
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const MAX_RASTER_SIZE: u64 = 64 * 1024 * 1024; // 64MB per rendered page

/// Configuration structure for OCR processing
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language codes joined with `+` (e.g. "eng+vie")
    pub languages: String,
    /// Resolution used when rendering a page for recognition
    pub dpi: u32,
    /// Buffer size for format detection in bytes
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// Rendered pages larger than this are rejected
    pub max_raster_size: u64,
    /// Tesseract data directory; `None` uses the system default
    pub tessdata_dir: Option<String>,
    /// Page rasteriser executable (poppler's `pdftoppm`)
    pub rasterizer: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            dpi: DEFAULT_DPI,
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            max_raster_size: MAX_RASTER_SIZE,
            tessdata_dir: None,
            rasterizer: "pdftoppm".to_string(),
        }
    }
}

impl OcrConfig {
    pub fn with_languages(mut self, languages: impl Into<String>) -> Self {
        self.languages = languages.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}
