//! # Docprompt Telegram Bot
//!
//! A Telegram bot that reads the text of an uploaded PDF or Word document
//! (with OCR for scanned PDF pages), forwards it with the user's instruction
//! to an OpenAI-compatible chat model and sends the answer back as a file.

pub mod bot;
pub mod completion;
pub mod config;
pub mod dialogue;
pub mod docx;
pub mod extract_errors;
pub mod extractor;
pub mod instance_manager;
pub mod localization;
pub mod ocr;
pub mod ocr_config;
pub mod pdf;
pub mod session_store;
pub mod webhook;
