//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod rate_limiter;
pub mod validation;

// Re-exports for convenience
pub use config::Settings;
pub use error::{AppError, AppResult, ConfigError};
pub use logging::init_logger;
