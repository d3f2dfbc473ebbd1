//! Conversation state for the upload-then-prompt dialogue.

use serde::{Deserialize, Serialize};

/// Two-state conversation machine.
///
/// `Idle --document--> AwaitingPrompt --prompt--> Idle`. A failed document
/// step leaves the state unchanged; `/cancel` also returns to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingPrompt,
}

impl ConversationState {
    /// State implied by whether a document is pending for the conversation
    pub fn from_pending(has_pending_document: bool) -> Self {
        if has_pending_document {
            ConversationState::AwaitingPrompt
        } else {
            ConversationState::Idle
        }
    }
}

/// Bot commands understood in every state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Cancel,
}

/// Recognise `/start`, `/help` and `/cancel`, including the `@botname` suffix
/// used in group chats. Anything else is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "cancel" => Some(Command::Cancel),
        _ => None,
    }
}

/// Validates a prompt message
pub fn validate_prompt(prompt: &str) -> Result<(), &'static str> {
    if prompt.trim().is_empty() {
        return Err("empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(ConversationState::default(), ConversationState::Idle);
    }

    #[test]
    fn test_state_from_pending() {
        assert_eq!(ConversationState::from_pending(true), ConversationState::AwaitingPrompt);
        assert_eq!(ConversationState::from_pending(false), ConversationState::Idle);
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/help@docprompt_bot"), Some(Command::Help));
        assert_eq!(parse_command("  /CANCEL now"), Some(Command::Cancel));
        assert_eq!(parse_command("/summarize"), None);
        assert_eq!(parse_command("Summarize /start"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_prompt_validation() {
        assert_eq!(validate_prompt("  Summarize  "), Ok(()));
        assert_eq!(validate_prompt(" \n\t "), Err("empty"));
    }
}
