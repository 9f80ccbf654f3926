//! mediarelay - Telegram bot that fetches media and delivers it within Telegram's size limits
//!
//! Every produced file is classified against two thresholds before anything
//! is uploaded: small files go out as video/audio, large ones as a
//! best-effort document, and files over the hard limit are refused with an
//! explanation instead of a doomed upload.
//!
//! # Module Structure
//!
//! - `delivery`: size tiers and transport selection (pure)
//! - `core`: configuration, errors, logging, rate limiting, validation
//! - `download`: job admission, yt-dlp backend, temp storage, delivery pipeline
//! - `telegram`: Telegram bot integration and handlers
//! - `cli`: command line interface

pub mod cli;
pub mod core;
pub mod delivery;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, Settings};
pub use delivery::{classify, plan, select_transport, Delivery, SizePolicy, Tier};
pub use telegram::{schema, HandlerDeps};
