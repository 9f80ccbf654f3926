//! Outbound side of a job: status messages and the final upload.
//!
//! The pipeline only talks to Telegram through [`Courier`], so it can be
//! driven by a recording double in tests.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::ChatId;
use thiserror::Error;

use crate::delivery::{Artifact, Transport};

/// Upload failures, split by whether retrying can help.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Telegram answered and refused the request (bad request, too large, wrong type)
    #[error("rejected by Telegram: {0}")]
    Rejected(String),

    /// Transport-level failure or an unreadable reply; the file may or may not have arrived
    #[error("network error: {0}")]
    Network(String),

    /// Flood control: Telegram asks to wait this long before the next request
    #[error("flood control, retry after {}s", .0.as_secs())]
    FloodControl(Duration),

    /// Local failure reading the artifact
    #[error("io error: {0}")]
    Io(String),
}

impl UploadError {
    /// Only network errors and flood control are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Network(_) | UploadError::FloodControl(_))
    }

    #[cfg(test)]
    fn test_flood_control_display() {
        assert_eq!(
            UploadError::FloodControl(Duration::from_secs(30)).to_string(),
            "flood control, retry after 30s"
        );
    }
}

#[async_trait]
pub trait Courier: Send + Sync {
    /// Sends a plain text message. Failures are logged by the implementation.
    async fn notify(&self, chat_id: ChatId, text: &str);

    /// Uploads `artifact` with the given Bot API method.
    async fn upload(&self, chat_id: ChatId, artifact: &Artifact, transport: Transport) -> Result<(), UploadError>;
}
