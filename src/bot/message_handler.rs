//! Message Handler module: the upload-then-prompt conversation flow

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::types::{Message, Update, UpdateKind};
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionClient, CompletionError, COMPLETION_FAILURE_MARKER};
use crate::config::DEFAULT_COMPLETION_TIMEOUT_SECS;
use crate::dialogue::{parse_command, validate_prompt, Command, ConversationState};
use crate::extract_errors::ExtractError;
use crate::extractor::{DocumentExtractor, DocumentKind};
use crate::localization::{t_args_lang, t_lang};
use crate::session_store::{ConversationId, SessionStore};

use super::gateway::ChatGateway;

/// What an inbound message carries, as far as the flow is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    Text(String),
    /// Photos, stickers, voice notes, ...
    Other,
}

/// Platform message reduced to what the flow needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ConversationId,
    pub language_code: Option<String>,
    pub kind: MessageKind,
}

impl IncomingMessage {
    /// `None` for updates that are not new messages (edits, callbacks, ...)
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) => Some(Self::from_message(msg)),
            _ => None,
        }
    }

    pub fn from_message(msg: &Message) -> Self {
        let language_code = msg
            .from
            .as_ref()
            .and_then(|user| user.language_code.clone());

        let kind = if let Some(doc) = msg.document() {
            MessageKind::Document {
                file_id: doc.file.id.0.clone(),
                file_name: doc.file_name.clone(),
            }
        } else if let Some(text) = msg.text() {
            MessageKind::Text(text.to_string())
        } else {
            MessageKind::Other
        };

        Self {
            chat_id: msg.chat.id.0,
            language_code,
            kind,
        }
    }
}

/// The two conversation transitions plus commands.
///
/// Every step catches its own failures and reports them to the user, so
/// [`ConversationFlow::handle`] always yields the next state.
pub struct ConversationFlow {
    gateway: Arc<dyn ChatGateway>,
    extractor: Arc<dyn DocumentExtractor>,
    sessions: Arc<dyn SessionStore>,
    completion: Arc<dyn CompletionClient>,
    response_dir: PathBuf,
    completion_timeout: Duration,
}

impl ConversationFlow {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        extractor: Arc<dyn DocumentExtractor>,
        sessions: Arc<dyn SessionStore>,
        completion: Arc<dyn CompletionClient>,
        response_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            gateway,
            extractor,
            sessions,
            completion,
            response_dir: response_dir.into(),
            completion_timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Response file for a conversation
    pub fn response_path(&self, chat_id: ConversationId) -> PathBuf {
        self.response_dir.join(format!("response_{chat_id}.txt"))
    }

    /// State of a conversation whose worker is just starting
    pub async fn initial_state(&self, chat_id: ConversationId) -> ConversationState {
        ConversationState::from_pending(self.sessions.contains(chat_id).await)
    }

    pub async fn handle(&self, state: ConversationState, message: IncomingMessage) -> ConversationState {
        let chat_id = message.chat_id;
        let language_code = message.language_code.as_deref();

        match message.kind {
            MessageKind::Document { file_id, file_name } => {
                self.handle_document(state, chat_id, &file_id, file_name.as_deref(), language_code)
                    .await
            }
            MessageKind::Text(text) => match (parse_command(&text), state) {
                (Some(command), _) => self.handle_command(state, chat_id, command, language_code).await,
                (None, ConversationState::AwaitingPrompt) => {
                    self.handle_prompt(chat_id, &text, language_code).await
                }
                (None, ConversationState::Idle) => {
                    debug!(user_id = chat_id, "Prompt received with no document");
                    self.notify(chat_id, t_lang("error-missing-content", language_code))
                        .await;
                    ConversationState::Idle
                }
            },
            MessageKind::Other => {
                debug!(user_id = chat_id, state = ?state, "Ignoring unsupported message type");
                state
            }
        }
    }

    /// `* --document--> AwaitingPrompt` on success; unchanged state on failure
    async fn handle_document(
        &self,
        state: ConversationState,
        chat_id: ConversationId,
        file_id: &str,
        file_name: Option<&str>,
        language_code: Option<&str>,
    ) -> ConversationState {
        let (name, kind) = match classify_upload(file_name) {
            Ok(classified) => classified,
            Err(e) => {
                warn!(user_id = chat_id, error = %e, "Unsupported document format rejected");
                self.notify(chat_id, extraction_error_message(&e, language_code))
                    .await;
                return state;
            }
        };

        info!(user_id = chat_id, file_name = %name, kind = ?kind, "Received document");
        self.notify(chat_id, t_lang("processing-document", language_code))
            .await;

        // The upload only lives as long as this step
        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to create scratch directory");
                self.notify(chat_id, extraction_error_message(&ExtractError::Io(e), language_code))
                    .await;
                return state;
            }
        };
        let path = scratch.path().join(&name);

        if let Err(e) = self.gateway.download_file(file_id, &path).await {
            error!(user_id = chat_id, error = %e, "Failed to download document");
            self.notify(chat_id, t_lang("error-download-failed", language_code))
                .await;
            return state;
        }

        let text = match self.extractor.extract(&path, kind).await {
            Ok(text) => text,
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Document extraction failed");
                self.notify(chat_id, extraction_error_message(&e, language_code))
                    .await;
                return state;
            }
        };

        if text.trim().is_empty() {
            warn!(user_id = chat_id, "Extraction returned no text");
            self.notify(chat_id, t_lang("error-no-text-found", language_code))
                .await;
            return state;
        }

        let chars = text.chars().count();
        self.sessions.put(chat_id, text).await;
        info!(user_id = chat_id, chars_extracted = chars, "Document ready for prompt");

        self.notify(
            chat_id,
            t_args_lang("document-ready", &[("chars", &chars.to_string())], language_code),
        )
        .await;
        ConversationState::AwaitingPrompt
    }

    /// `AwaitingPrompt --prompt--> Idle`
    async fn handle_prompt(
        &self,
        chat_id: ConversationId,
        text: &str,
        language_code: Option<&str>,
    ) -> ConversationState {
        if validate_prompt(text).is_err() {
            self.notify(chat_id, t_lang("error-empty-prompt", language_code))
                .await;
            return ConversationState::AwaitingPrompt;
        }

        let Some(document) = self.sessions.take(chat_id).await else {
            info!(user_id = chat_id, "No pending document for prompt");
            self.notify(chat_id, t_lang("error-missing-content", language_code))
                .await;
            return ConversationState::Idle;
        };

        self.notify(chat_id, t_lang("sending-to-model", language_code))
            .await;

        let outcome = self.run_completion(text, &document).await;
        if let Err(e) = &outcome {
            error!(user_id = chat_id, error = %e, "Completion failed");
        }
        let reply = completion_reply(outcome, language_code);

        match self.deliver_response(chat_id, &reply).await {
            Ok(path) => info!(user_id = chat_id, path = %path.display(), "Response delivered"),
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to deliver response file");
                self.notify(chat_id, t_lang("error-response-file", language_code))
                    .await;
            }
        }

        ConversationState::Idle
    }

    async fn handle_command(
        &self,
        state: ConversationState,
        chat_id: ConversationId,
        command: Command,
        language_code: Option<&str>,
    ) -> ConversationState {
        match command {
            Command::Start => {
                self.notify(chat_id, t_lang("welcome", language_code)).await;
                state
            }
            Command::Help => {
                self.notify(chat_id, t_lang("help", language_code)).await;
                state
            }
            Command::Cancel => {
                let discarded = self.sessions.take(chat_id).await.is_some();
                let key = if discarded { "cancelled" } else { "nothing-to-cancel" };
                info!(user_id = chat_id, discarded, "Cancel requested");
                self.notify(chat_id, t_lang(key, language_code)).await;
                ConversationState::Idle
            }
        }
    }

    async fn run_completion(&self, prompt: &str, document: &str) -> Result<String, CompletionError> {
        match tokio::time::timeout(self.completion_timeout, self.completion.complete(prompt, document)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CompletionError::Timeout(self.completion_timeout.as_secs())),
        }
    }

    /// Write the reply to the conversation's response file and send it
    async fn deliver_response(&self, chat_id: ConversationId, reply: &str) -> Result<PathBuf> {
        let path = self.response_path(chat_id);
        tokio::fs::create_dir_all(&self.response_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.response_dir.display()))?;
        tokio::fs::write(&path, reply)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.gateway.send_document(chat_id, &path).await?;
        Ok(path)
    }

    /// Send a message, logging instead of failing the step
    async fn notify(&self, chat_id: ConversationId, text: String) {
        if let Err(e) = self.gateway.send_text(chat_id, text).await {
            warn!(user_id = chat_id, error = %e, "Failed to send message");
        }
    }
}

/// Reply text for the user: the model's answer, or a marked placeholder
/// describing the failure
pub fn completion_reply(outcome: Result<String, CompletionError>, language_code: Option<&str>) -> String {
    match outcome {
        Ok(reply) => reply,
        Err(e) => format!(
            "{COMPLETION_FAILURE_MARKER} {}",
            t_args_lang("error-completion", &[("detail", &e.to_string())], language_code)
        ),
    }
}

fn extraction_error_message(err: &ExtractError, language_code: Option<&str>) -> String {
    match err {
        ExtractError::UnsupportedKind(_) | ExtractError::Timeout(_) => {
            t_lang(err.message_key(), language_code)
        }
        _ => t_args_lang(err.message_key(), &[("detail", &err.to_string())], language_code),
    }
}

/// Stored base name and kind of an upload, or why it cannot be read
pub fn classify_upload(file_name: Option<&str>) -> Result<(String, DocumentKind), ExtractError> {
    let unsupported = || ExtractError::UnsupportedKind(file_name.unwrap_or_default().to_string());
    let name = file_name.and_then(local_file_name).ok_or_else(unsupported)?;
    let kind = DocumentKind::from_file_name(&name).ok_or_else(unsupported)?;
    Ok((name, kind))
}

/// Base name of an uploaded file, with any directory components dropped
fn local_file_name(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
