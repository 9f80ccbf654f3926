//! [`Courier`] backed by the Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::RequestError;

use crate::delivery::{Artifact, Transport};
use crate::download::courier::{Courier, UploadError};
use crate::telegram::Bot;

#[derive(Clone)]
pub struct TelegramCourier {
    bot: Bot,
}

impl TelegramCourier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Courier for TelegramCourier {
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.bot.send_message(chat_id, text).await {
            log::warn!("Failed to send message to chat {}: {}", chat_id, e);
        }
    }

    async fn upload(&self, chat_id: ChatId, artifact: &Artifact, transport: Transport) -> Result<(), UploadError> {
        log::info!(
            "Uploading {} ({} bytes) to chat {} via {}",
            artifact.file_name(),
            artifact.size_bytes,
            chat_id,
            transport.api_method()
        );
        let file = InputFile::file(&artifact.path).file_name(artifact.file_name());

        let result = match transport {
            Transport::Video => self.bot.send_video(chat_id, file).supports_streaming(true).await,
            Transport::Audio => self.bot.send_audio(chat_id, file).await,
            // Without this Telegram may turn an mp4 document back into a video
            Transport::Document => {
                self.bot
                    .send_document(chat_id, file)
                    .disable_content_type_detection(true)
                    .await
            }
        };

        result.map(|_| ()).map_err(upload_error)
    }
}

/// Splits Bot API errors into "Telegram refused" and "may succeed on retry".
///
/// A reply that is not Bot API JSON (a proxy error page, a restarting local
/// server) says nothing about the file, so it counts as a network failure.
pub fn upload_error(err: RequestError) -> UploadError {
    match err {
        RequestError::Api(api) => UploadError::Rejected(api.to_string()),
        RequestError::RetryAfter(seconds) => UploadError::FloodControl(seconds.duration()),
        RequestError::Network(e) => UploadError::Network(e.to_string()),
        RequestError::InvalidJson { source, .. } => UploadError::Network(format!("unreadable reply: {}", source)),
        RequestError::Io(e) => UploadError::Io(e.to_string()),
        other => UploadError::Rejected(other.to_string()),
    }
}
