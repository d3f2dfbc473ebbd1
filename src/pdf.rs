//! # PDF Extraction Module
//!
//! Reads the text layer of every page with `lopdf`. Pages whose text layer is
//! blank (scanned pages) are handed to a [`PageOcr`] instead. Page outputs are
//! appended in page order without separators.

use std::path::Path;
use std::sync::Arc;

use lopdf::Document;
use tracing::{debug, info, warn};

use crate::extract_errors::ExtractError;
use crate::ocr::PageOcr;

/// Result of extracting a PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfExtraction {
    pub text: String,
    pub page_count: usize,
    /// 1-based numbers of the pages whose text came from OCR
    pub ocr_pages: Vec<u32>,
}

pub struct PdfExtractor {
    ocr: Arc<dyn PageOcr>,
}

impl PdfExtractor {
    pub fn new(ocr: Arc<dyn PageOcr>) -> Self {
        Self { ocr }
    }

    /// Extract the full text of the PDF at `path`
    pub fn extract_text_from_file(&self, path: &Path) -> Result<PdfExtraction, ExtractError> {
        let doc = Document::load(path)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        info!(
            path = %path.display(),
            page_count = page_numbers.len(),
            "Extracting PDF text"
        );

        let extraction = merge_page_text(
            path,
            &page_numbers,
            |page| text_layer(&doc, page),
            self.ocr.as_ref(),
        )?;

        info!(
            page_count = extraction.page_count,
            ocr_pages = extraction.ocr_pages.len(),
            chars_extracted = extraction.text.len(),
            "PDF extraction completed"
        );
        Ok(extraction)
    }
}

/// Build the document text from per-page text layers, falling back to OCR
/// for every page whose layer is empty or whitespace-only.
pub fn merge_page_text<F>(
    pdf_path: &Path,
    page_numbers: &[u32],
    mut text_layer: F,
    ocr: &dyn PageOcr,
) -> Result<PdfExtraction, ExtractError>
where
    F: FnMut(u32) -> String,
{
    let mut text = String::new();
    let mut ocr_pages = Vec::new();

    for &page in page_numbers {
        let direct = text_layer(page);
        if direct.trim().is_empty() {
            debug!(page, "Page has no text layer, falling back to OCR");
            text.push_str(&ocr.recognize_page(pdf_path, page)?);
            ocr_pages.push(page);
        } else {
            text.push_str(&direct);
        }
    }

    Ok(PdfExtraction {
        text,
        page_count: page_numbers.len(),
        ocr_pages,
    })
}

fn text_layer(doc: &Document, page: u32) -> String {
    match doc.extract_text(&[page]) {
        Ok(text) => text,
        Err(e) => {
            // Undecodable text layer (odd font encodings); treat like a scanned page
            warn!(page, error = %e, "Could not decode page text layer");
            String::new()
        }
    }
}
