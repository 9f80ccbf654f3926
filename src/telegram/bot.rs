//! Bot initialization and message routing utilities
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Message addressing logic (private chats, mentions, replies)

use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatKind, Message, MessageEntityKind, UserId};
use teloxide::utils::command::BotCommands;

use crate::core::config::{self, Settings};
use crate::telegram::Bot;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "how to use the bot")]
    Start,
    #[command(description = "size limits and usage")]
    Help,
    #[command(description = "download audio only: /audio <link>")]
    Audio(String),
    #[command(description = "stop your current download")]
    Cancel,
}

/// Creates a Bot instance with the configured token and optional local Bot API URL
///
/// # Arguments
/// * `settings` - Validated settings (token, `BOT_API_URL`)
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(settings: &Settings) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config::network::timeout())
        .build()?;
    let bot = Bot::with_client(settings.bot_token.expose_secret(), client);

    let bot = match &settings.bot_api_url {
        Some(url) => {
            log::info!("Using custom Bot API URL: {}", url);
            bot.set_api_url(url.clone())
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "how to use the bot"),
        BotCommand::new("help", "size limits and usage"),
        BotCommand::new("audio", "download audio only: /audio <link>"),
        BotCommand::new("cancel", "stop your current download"),
    ])
    .await?;

    Ok(())
}

/// Checks if a message is addressed to the bot
///
/// # Arguments
/// * `msg` - Message to check
/// * `bot_username` - Bot's username (without @)
/// * `bot_id` - Bot's user ID
///
/// # Returns
/// * `true` if message is addressed to bot (private chat, bot mention, reply to bot message)
/// * `false` if message is not addressed to bot
pub fn is_message_addressed_to_bot(msg: &Message, bot_username: Option<&str>, bot_id: UserId) -> bool {
    // In private chats, all messages are addressed to the bot
    if matches!(msg.chat.kind, ChatKind::Private(_)) {
        return true;
    }

    if let Some(from) = msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
        if from.id == bot_id {
            return true;
        }
    }

    let (Some(text), Some(username)) = (msg.text(), bot_username) else {
        return false;
    };

    // Entity offsets are in UTF-16 code units
    let utf16: Vec<u16> = text.encode_utf16().collect();
    let mentioned = msg.entities().unwrap_or_default().iter().any(|entity| {
        matches!(entity.kind, MessageEntityKind::Mention)
            && utf16
                .get(entity.offset..entity.offset + entity.length)
                .map(String::from_utf16_lossy)
                .map(|mention| mention.trim_start_matches('@').eq_ignore_ascii_case(username))
                .unwrap_or(false)
    });

    mentioned || text.contains(&format!("@{}", username))
}
