//! # Extractor Module
//!
//! Entry point of the ingestion pipeline: decide the document kind from the
//! file name, then produce its full plain text.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::docx::DocxExtractor;
use crate::extract_errors::ExtractError;
use crate::ocr::PageOcr;
use crate::pdf::PdfExtractor;

/// Document formats the bot can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// Office Open XML word-processing document (`.docx`)
    Docx,
}

impl DocumentKind {
    /// Classify by extension, case-insensitively
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

/// Produces the plain text of a stored document
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<String, ExtractError>;
}

/// Extractor backed by the PDF and DOCX readers.
///
/// Parsing, rendering and OCR are blocking, so each call runs on the blocking
/// pool and is bounded by `timeout`.
pub struct FileExtractor {
    pdf: Arc<PdfExtractor>,
    docx: Arc<DocxExtractor>,
    timeout: Duration,
}

impl FileExtractor {
    pub fn new(ocr: Arc<dyn PageOcr>, timeout: Duration) -> Self {
        Self {
            pdf: Arc::new(PdfExtractor::new(ocr)),
            docx: Arc::new(DocxExtractor::new()),
            timeout,
        }
    }

    fn extract_blocking(
        pdf: &PdfExtractor,
        docx: &DocxExtractor,
        path: &Path,
        kind: DocumentKind,
    ) -> Result<String, ExtractError> {
        match kind {
            DocumentKind::Pdf => pdf.extract_text_from_file(path).map(|extraction| extraction.text),
            DocumentKind::Docx => docx.extract_text_from_file(path),
        }
    }
}

#[async_trait]
impl DocumentExtractor for FileExtractor {
    async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<String, ExtractError> {
        info!(path = %path.display(), kind = ?kind, "Starting document extraction");

        let pdf = Arc::clone(&self.pdf);
        let docx = Arc::clone(&self.docx);
        let owned_path: PathBuf = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            Self::extract_blocking(&pdf, &docx, &owned_path, kind)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!(error = %join_error, "Extraction task failed");
                Err(ExtractError::TaskFailed(join_error.to_string()))
            }
            Err(_) => Err(ExtractError::Timeout(self.timeout.as_secs())),
        }
    }
}
