//! # DOCX Extraction Module
//!
//! Paragraph text from WordprocessingML (`word/document.xml` inside the ZIP
//! container). Each `w:p` is one paragraph; paragraphs are joined with `\n`
//! in document order. Tables, headers, footers and images are not read.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::info;

use crate::extract_errors::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_text_from_file(&self, path: &Path) -> Result<String, ExtractError> {
        let file = File::open(path)?;
        let paragraphs = read_paragraphs(file)?;

        info!(
            path = %path.display(),
            paragraphs = paragraphs.len(),
            "DOCX extraction completed"
        );
        Ok(paragraphs.join("\n"))
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Paragraph texts of a DOCX container, in document order
pub fn read_paragraphs<R: Read + Seek>(reader: R) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractError::Docx(format!("{DOCUMENT_PART}: {e}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)?;

    paragraphs_from_xml(&xml)
}

/// Walk the document body and collect the text of each `w:p` that is a
/// direct child of `w:body`.
///
/// Runs (`w:t`) inside a paragraph are concatenated; `w:tab` becomes a tab
/// and `w:br`/`w:cr` a line break. Tables and embedded content (text boxes,
/// drawings, alternate-content blocks) are skipped entirely.
pub fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text_run = false;
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    // Depth of the element whose subtree is being skipped
    let mut skipping: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if skipping.is_some() {
                    continue;
                }
                let name = e.name();
                let name = name.as_ref();
                match name {
                    b"w:body" => body_depth = Some(depth),
                    b"w:p" if current.is_none() && is_body_child(body_depth, depth) => {
                        current = Some(String::new())
                    }
                    b"w:t" if current.is_some() => in_text_run = true,
                    b"w:p" if current.is_some() => skipping = Some(depth),
                    _ if is_skipped_subtree(name) => skipping = Some(depth),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if skipping.is_some() {
                    continue;
                }
                match (e.name().as_ref(), current.as_mut()) {
                    (b"w:p", None) if is_body_child(body_depth, depth + 1) => {
                        paragraphs.push(String::new())
                    }
                    (b"w:tab", Some(text)) => text.push('\t'),
                    (b"w:br" | b"w:cr", Some(text)) => text.push('\n'),
                    _ => {}
                }
            }
            Event::Text(e) if in_text_run && skipping.is_none() => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::End(e) => {
                if skipping == Some(depth) {
                    skipping = None;
                } else if skipping.is_none() {
                    match e.name().as_ref() {
                        b"w:t" => in_text_run = false,
                        b"w:p" if is_body_child(body_depth, depth) => {
                            if let Some(text) = current.take() {
                                paragraphs.push(text);
                            }
                        }
                        b"w:body" => body_depth = None,
                        _ => {}
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn is_body_child(body_depth: Option<usize>, depth: usize) -> bool {
    body_depth.is_some_and(|body| depth == body + 1)
}

/// Elements whose content is not part of the body paragraph text
fn is_skipped_subtree(name: &[u8]) -> bool {
    matches!(
        name,
        b"w:tbl" | b"w:txbxContent" | b"w:pict" | b"w:drawing" | b"w:object" | b"mc:AlternateContent"
    )
}
