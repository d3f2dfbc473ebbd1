//! # Configuration Module
//!
//! Process configuration read from environment variables (optionally seeded
//! from a `.env` file). Only the bot token, the LLM API key and the public
//! webhook URL are required; everything else has a default.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ocr_config::{DEFAULT_DPI, DEFAULT_LANGUAGES};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_LOCALES_DIR: &str = "./locales";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Log output format selected with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings for the OpenAI-compatible completion endpoint
#[derive(Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Optional output cap; `None` sends no `max_tokens`
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl std::fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Complete bot configuration
#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub webhook_url: String,
    pub port: u16,
    pub completion: CompletionSettings,
    pub extraction_timeout: Duration,
    pub ocr_languages: String,
    pub ocr_dpi: u32,
    pub queue_capacity: usize,
    /// Pending documents never expire when `None`
    pub session_ttl: Option<Duration>,
    pub response_dir: PathBuf,
    pub locales_dir: PathBuf,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .field("port", &self.port)
            .field("completion", &self.completion)
            .field("extraction_timeout", &self.extraction_timeout)
            .field("ocr_languages", &self.ocr_languages)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("queue_capacity", &self.queue_capacity)
            .field("session_ttl", &self.session_ttl)
            .field("response_dir", &self.response_dir)
            .field("locales_dir", &self.locales_dir)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let webhook_url = get("WEBHOOK_URL").ok_or(ConfigError::Missing("WEBHOOK_URL"))?;

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let max_tokens = parse_optional("COMPLETION_MAX_TOKENS", get("COMPLETION_MAX_TOKENS"))?;
        let completion_timeout = parse_or(
            "COMPLETION_TIMEOUT_SECS",
            get("COMPLETION_TIMEOUT_SECS"),
            DEFAULT_COMPLETION_TIMEOUT_SECS,
        )?;
        let extraction_timeout = parse_or(
            "EXTRACTION_TIMEOUT_SECS",
            get("EXTRACTION_TIMEOUT_SECS"),
            DEFAULT_EXTRACTION_TIMEOUT_SECS,
        )?;
        let ocr_dpi = parse_or("OCR_DPI", get("OCR_DPI"), DEFAULT_DPI)?;
        let queue_capacity = parse_or(
            "UPDATE_QUEUE_CAPACITY",
            get("UPDATE_QUEUE_CAPACITY"),
            DEFAULT_QUEUE_CAPACITY,
        )?;
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "UPDATE_QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }
        let session_ttl: Option<u64> = parse_optional("SESSION_TTL_SECS", get("SESSION_TTL_SECS"))?;

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bot_token,
            webhook_url,
            port,
            completion: CompletionSettings {
                api_key,
                base_url: get("OPENAI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_tokens,
                timeout: Duration::from_secs(completion_timeout),
            },
            extraction_timeout: Duration::from_secs(extraction_timeout),
            ocr_languages: get("OCR_LANGUAGES").unwrap_or_else(|| DEFAULT_LANGUAGES.to_string()),
            ocr_dpi,
            queue_capacity,
            session_ttl: session_ttl.filter(|secs| *secs > 0).map(Duration::from_secs),
            response_dir: get("RESPONSE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            locales_dir: get("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCALES_DIR)),
            log_format,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_optional(name, raw)?.unwrap_or(default))
}

fn parse_optional<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value })
    })
    .transpose()
}
