//! Chat platform boundary: sending messages and files, fetching uploads.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use tracing::debug;

use crate::session_store::ConversationId;

/// Everything the conversation flow needs from the chat platform
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_text(&self, chat_id: ConversationId, text: String) -> Result<()>;

    /// Send a local file as a document attachment
    async fn send_document(&self, chat_id: ConversationId, path: &Path) -> Result<()>;

    /// Download an uploaded file to `destination`
    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()>;
}

/// Telegram implementation backed by a teloxide [`Bot`]
pub struct TelegramGateway {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, chat_id: ConversationId, text: String) -> Result<()> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ConversationId, path: &Path) -> Result<()> {
        self.bot
            .send_document(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .context("Failed to resolve uploaded file")?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("Failed to write upload to {}", destination.display()))?;

        debug!(
            path = %destination.display(),
            bytes = bytes.len(),
            "Upload downloaded"
        );
        Ok(())
    }
}
