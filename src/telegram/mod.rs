//! Telegram bot integration and handlers

pub mod bot;
pub mod courier;
pub mod handlers;
pub mod keyboards;
pub mod messages;
pub mod sessions;

/// Bot type used across the crate
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, is_message_addressed_to_bot, setup_bot_commands, Command};
pub use courier::TelegramCourier;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use sessions::SessionStore;
