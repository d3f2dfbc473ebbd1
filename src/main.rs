use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use docprompt::bot::{update_queue, ConversationFlow, TelegramGateway, UpdateDispatcher};
use docprompt::completion::OpenAiClient;
use docprompt::config::{BotConfig, LogFormat};
use docprompt::extractor::FileExtractor;
use docprompt::localization::init_localization;
use docprompt::ocr::TesseractPageOcr;
use docprompt::ocr_config::OcrConfig;
use docprompt::session_store::{spawn_expiry_sweeper, InMemorySessionStore, SessionStore};
use docprompt::webhook;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    init_logging(config.log_format);

    info!("Starting Docprompt Telegram Bot");
    info!(
        port = config.port,
        model = %config.completion.model,
        ocr_languages = %config.ocr_languages,
        queue_capacity = config.queue_capacity,
        session_ttl = ?config.session_ttl,
        "Configuration loaded"
    );

    if !init_localization(&config.locales_dir) {
        warn!("Localization was already initialised");
    }

    let bot = Bot::new(config.bot_token.clone());
    let webhook_url = url::Url::parse(&config.webhook_url)
        .with_context(|| format!("Invalid WEBHOOK_URL {:?}", config.webhook_url))?;
    bot.set_webhook(webhook_url)
        .await
        .context("Failed to register webhook")?;
    info!(url = %config.webhook_url, "Webhook registered");

    let sessions = Arc::new(InMemorySessionStore::with_ttl(config.session_ttl));
    if let Some(ttl) = config.session_ttl {
        spawn_expiry_sweeper(sessions.clone(), ttl);
    }

    let ocr_config = OcrConfig::default()
        .with_languages(config.ocr_languages.clone())
        .with_dpi(config.ocr_dpi);
    let extractor = FileExtractor::new(
        Arc::new(TesseractPageOcr::new(ocr_config)),
        config.extraction_timeout,
    );
    let completion_timeout = config.completion.timeout;
    let completion =
        OpenAiClient::new(config.completion.clone()).context("Failed to build completion client")?;

    let sessions: Arc<dyn SessionStore> = sessions;
    let flow = ConversationFlow::new(
        Arc::new(TelegramGateway::new(bot)),
        Arc::new(extractor),
        sessions,
        Arc::new(completion),
        config.response_dir.clone(),
    )
    .with_completion_timeout(completion_timeout);

    let (queue, updates) = update_queue(config.queue_capacity);
    let dispatcher = tokio::spawn(UpdateDispatcher::new(Arc::new(flow)).run(updates));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tokio::select! {
        result = webhook::serve(listener, queue) => {
            if let Err(e) = result {
                error!(error = %e, "Webhook server stopped");
                return Err(e.into());
            }
        }
        result = dispatcher => {
            if let Err(e) = result {
                error!(error = %e, "Update dispatcher stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    info!("Bot stopped");
    Ok(())
}
