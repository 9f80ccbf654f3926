use thiserror::Error;

use crate::download::courier::UploadError;
use crate::download::error::DownloadError;

/// Invalid or missing configuration. Always fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    ZeroLimit { name: &'static str },

    #[error("TG_SAFE_LIMIT_MB ({safe_mb}) must not exceed TG_HARD_LIMIT_MB ({hard_mb})")]
    InvertedLimits { safe_mb: u64, hard_mb: u64 },

    #[error("Missing required env var: {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent error handling.
/// Uses `thiserror` for automatic error conversion and display formatting.
///
/// # Example
///
/// ```no_run
/// use mediarelay::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Upload errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Job was cancelled by the user
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Short stable tag for log lines
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Download(e) => e.category(),
            AppError::Upload(_) => "upload",
            AppError::Io(_) => "io",
            AppError::Validation(_) => "validation",
            AppError::Cancelled => "cancelled",
        }
    }

    /// Text safe to show to a user. Tool output and internal paths stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Download(e) => e.user_message().to_string(),
            AppError::Upload(_) => "⚠️ Telegram did not accept the file.".to_string(),
            AppError::Validation(msg) => format!("⚠️ {}", msg),
            AppError::Cancelled => "⛔ Stopped.".to_string(),
            AppError::Config(_) | AppError::Io(_) => {
                "⛔ Something went wrong on my side. Please try again later.".to_string()
            }
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
