//! Shared fakes and fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use docprompt::bot::{ChatGateway, ConversationFlow, IncomingMessage, MessageKind};
use docprompt::completion::{CompletionClient, CompletionError};
use docprompt::extract_errors::ExtractError;
use docprompt::extractor::FileExtractor;
use docprompt::ocr::PageOcr;
use docprompt::session_store::{ConversationId, InMemorySessionStore, SessionStore};

/// What the bot sent to the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: ConversationId, text: String },
    Document { chat_id: ConversationId, file_name: String, contents: String },
}

/// Chat gateway that serves uploads from memory and records everything sent
#[derive(Default)]
pub struct RecordingGateway {
    uploads: Mutex<HashMap<String, Vec<u8>>>,
    sent: Mutex<Vec<Sent>>,
    downloads: Mutex<Vec<String>>,
    fail_documents: AtomicBool,
}

impl RecordingGateway {
    pub fn add_upload(&self, file_id: &str, bytes: Vec<u8>) {
        self.uploads.lock().unwrap().insert(file_id.to_string(), bytes);
    }

    pub fn fail_documents(&self) {
        self.fail_documents.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self, chat_id: ConversationId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id: id, text } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self, chat_id: ConversationId) -> Option<String> {
        self.texts(chat_id).pop()
    }

    pub fn documents(&self, chat_id: ConversationId) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Document {
                    chat_id: id,
                    file_name,
                    contents,
                } if id == chat_id => Some((file_name, contents)),
                _ => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_text(&self, chat_id: ConversationId, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text { chat_id, text });
        Ok(())
    }

    async fn send_document(&self, chat_id: ConversationId, path: &Path) -> Result<()> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(anyhow!("upload rejected"));
        }
        let contents = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sent.lock().unwrap().push(Sent::Document {
            chat_id,
            file_name,
            contents,
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(file_id.to_string());
        let bytes = self
            .uploads
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("file {file_id} not found"))?;
        std::fs::write(destination, bytes)?;
        Ok(())
    }
}

/// OCR that returns canned text per page and records the pages it was asked for
#[derive(Default)]
pub struct ScriptedOcr {
    pages: HashMap<u32, String>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedOcr {
    pub fn new(pages: &[(u32, &str)]) -> Self {
        Self {
            pages: pages.iter().map(|(n, t)| (*n, t.to_string())).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

impl PageOcr for ScriptedOcr {
    fn recognize_page(&self, _pdf_path: &Path, page_number: u32) -> Result<String, ExtractError> {
        self.calls.lock().unwrap().push(page_number);
        self.pages
            .get(&page_number)
            .cloned()
            .ok_or_else(|| ExtractError::Ocr(format!("no scan for page {page_number}")))
    }
}

pub enum CompletionBehavior {
    Reply(String),
    Fail,
    Hang,
}

/// Completion client that records every (system, user) pair it receives
pub struct RecordingCompletion {
    behavior: CompletionBehavior,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingCompletion {
    pub fn new(behavior: CompletionBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(CompletionBehavior::Reply(reply.to_string()))
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for RecordingCompletion {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_text.to_string()));
        match &self.behavior {
            CompletionBehavior::Reply(reply) => Ok(reply.clone()),
            CompletionBehavior::Fail => Err(CompletionError::Api {
                status: 503,
                message: "upstream unavailable".to_string(),
            }),
            CompletionBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

/// A conversation flow wired to in-memory fakes and the real file extractor
pub struct Harness {
    pub gateway: Arc<RecordingGateway>,
    pub sessions: Arc<InMemorySessionStore>,
    pub completion: Arc<RecordingCompletion>,
    pub ocr: Arc<ScriptedOcr>,
    pub response_dir: TempDir,
    pub flow: ConversationFlow,
}

impl Harness {
    pub fn new(completion: RecordingCompletion, ocr: ScriptedOcr) -> Self {
        Self::with_store(completion, ocr, InMemorySessionStore::new())
    }

    pub fn with_store(completion: RecordingCompletion, ocr: ScriptedOcr, store: InMemorySessionStore) -> Self {
        let gateway = Arc::new(RecordingGateway::default());
        let sessions = Arc::new(store);
        let completion = Arc::new(completion);
        let ocr = Arc::new(ocr);
        let response_dir = tempfile::tempdir().unwrap();

        let sessions_dyn: Arc<dyn SessionStore> = sessions.clone();
        let flow = ConversationFlow::new(
            gateway.clone(),
            Arc::new(FileExtractor::new(ocr.clone(), Duration::from_secs(30))),
            sessions_dyn,
            completion.clone(),
            response_dir.path().join("responses"),
        );

        Self {
            gateway,
            sessions,
            completion,
            ocr,
            response_dir,
            flow,
        }
    }

    pub fn response_file(&self, chat_id: ConversationId) -> PathBuf {
        self.flow.response_path(chat_id)
    }
}

pub fn document(chat_id: ConversationId, file_id: &str, file_name: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        language_code: None,
        kind: MessageKind::Document {
            file_id: file_id.to_string(),
            file_name: Some(file_name.to_string()),
        },
    }
}

pub fn text(chat_id: ConversationId, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        language_code: None,
        kind: MessageKind::Text(text.to_string()),
    }
}

/// Build a PDF with one page per entry; `None` pages have an empty content
/// stream, like a scan without a text layer.
pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let operations = match page {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => vec![],
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Text layer of one page as lopdf itself reads it
pub fn pdf_page_text(bytes: &[u8], page: u32) -> String {
    Document::load_mem(bytes).unwrap().extract_text(&[page]).unwrap()
}

/// Build a minimal .docx whose body holds one paragraph per entry
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, xml_escape(p))
            }
        })
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
