//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `gateway`: Sends messages and files, downloads uploads
//! - `message_handler`: The upload-then-prompt conversation flow
//! - `dispatcher`: Bounded update queue and per-conversation workers

pub mod dispatcher;
pub mod gateway;
pub mod message_handler;

pub use dispatcher::{update_queue, EnqueueError, UpdateDispatcher, UpdateQueue};
pub use gateway::{ChatGateway, TelegramGateway};
pub use message_handler::{completion_reply, ConversationFlow, IncomingMessage, MessageKind};
