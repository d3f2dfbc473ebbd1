//! # OCR Module
//!
//! Recognition of PDF pages that carry no text layer. A page is rendered to a
//! PNG with poppler's `pdftoppm`, the raster is checked, and Tesseract reads it
//! with the configured language set.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::extract_errors::ExtractError;
use crate::instance_manager::OcrInstanceManager;
use crate::ocr_config::OcrConfig;

/// Recognises the text of a single PDF page from its rendered image.
///
/// Implementations are blocking; callers run them off the async runtime.
pub trait PageOcr: Send + Sync {
    /// `page_number` is 1-based, as in the PDF page tree.
    fn recognize_page(&self, pdf_path: &Path, page_number: u32) -> Result<String, ExtractError>;
}

/// `pdftoppm` + Tesseract implementation of [`PageOcr`]
pub struct TesseractPageOcr {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
}

impl TesseractPageOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self::with_instances(config, Arc::new(OcrInstanceManager::new()))
    }

    pub fn with_instances(config: OcrConfig, instances: Arc<OcrInstanceManager>) -> Self {
        Self { config, instances }
    }

    /// Render one page to `<out_dir>/page-<n>.png`
    pub fn render_page(
        &self,
        pdf_path: &Path,
        page_number: u32,
        out_dir: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let prefix = out_dir.join(format!("page-{page_number}"));
        let page = page_number.to_string();
        let dpi = self.config.dpi.to_string();

        debug!(page = page_number, dpi = self.config.dpi, "Rendering page for OCR");

        let output = Command::new(&self.config.rasterizer)
            .args(["-f", page.as_str(), "-l", page.as_str()])
            .args(["-r", dpi.as_str()])
            .args(["-png", "-singlefile"])
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| ExtractError::Rasterize {
                page: page_number,
                message: format!("failed to run {}: {e}", self.config.rasterizer),
            })?;

        if !output.status.success() {
            return Err(ExtractError::Rasterize {
                page: page_number,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            return Err(ExtractError::Rasterize {
                page: page_number,
                message: "rasterizer produced no image".to_string(),
            });
        }

        Ok(image_path)
    }
}

impl PageOcr for TesseractPageOcr {
    fn recognize_page(&self, pdf_path: &Path, page_number: u32) -> Result<String, ExtractError> {
        let scratch = tempfile::tempdir()?;
        let image_path = self.render_page(pdf_path, page_number, scratch.path())?;

        let size = std::fs::metadata(&image_path)?.len();
        if size > self.config.max_raster_size {
            return Err(ExtractError::Rasterize {
                page: page_number,
                message: format!(
                    "rendered page is {size} bytes, limit is {}",
                    self.config.max_raster_size
                ),
            });
        }
        if !is_supported_image_format(&image_path, &self.config) {
            return Err(ExtractError::Rasterize {
                page: page_number,
                message: "rendered page is not a readable image".to_string(),
            });
        }

        let text = recognize_image(&image_path, &self.config, &self.instances)?;
        info!(
            page = page_number,
            chars_extracted = text.len(),
            "OCR recognition completed for page"
        );
        Ok(text)
    }
}

/// Run Tesseract on an image file
pub fn recognize_image(
    image_path: &Path,
    config: &OcrConfig,
    instances: &OcrInstanceManager,
) -> Result<String, ExtractError> {
    let engine = instances.get_instance(config)?;
    let mut tess = engine
        .lock()
        .map_err(|_| ExtractError::Ocr("OCR engine lock poisoned".to_string()))?;

    let path = image_path.to_string_lossy();
    tess.set_image(&*path)
        .map_err(|e| ExtractError::Ocr(format!("Failed to load image for OCR: {e}")))?;

    tess.get_utf8_text()
        .map_err(|e| ExtractError::Ocr(format!("Failed to extract text from image: {e}")))
}

/// Check that a raster is in a format Tesseract accepts, using `image::guess_format`
pub fn is_supported_image_format(file_path: &Path, config: &OcrConfig) -> bool {
    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %file_path.display(), error = %e, "Could not open image for format detection");
            return false;
        }
    };

    let mut reader = BufReader::new(file);
    let mut buffer = vec![0; config.buffer_size];

    match reader.read(&mut buffer) {
        Ok(bytes_read) if bytes_read >= config.min_format_bytes => {
            buffer.truncate(bytes_read);
            match image::guess_format(&buffer) {
                // Tesseract supports: PNG, JPEG/JPG, BMP, TIFF
                Ok(format) => matches!(
                    format,
                    image::ImageFormat::Png
                        | image::ImageFormat::Jpeg
                        | image::ImageFormat::Bmp
                        | image::ImageFormat::Tiff
                ),
                Err(e) => {
                    debug!(path = %file_path.display(), error = %e, "Could not determine image format");
                    false
                }
            }
        }
        Ok(bytes_read) => {
            debug!(
                path = %file_path.display(),
                bytes_read,
                "Not enough bytes to determine image format"
            );
            false
        }
        Err(e) => {
            warn!(path = %file_path.display(), error = %e, "Error reading image for format detection");
            false
        }
    }
}
