//! Inline keyboard for format choices and its callback data.
//!
//! Callback data is `fmt:<version>:<choice id>`, well under the 64 bytes
//! Telegram allows.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::delivery::FormatChoice;

const CALLBACK_PREFIX: &str = "fmt";

/// Choice id of the "audio only" button
pub const AUDIO_CHOICE: &str = "audio";

pub fn format_callback_data(version: u32, choice_id: &str) -> String {
    format!("{}:{}:{}", CALLBACK_PREFIX, version, choice_id)
}

/// Splits callback data into session version and choice id.
pub fn parse_format_callback(data: &str) -> Option<(u32, &str)> {
    let rest = data.strip_prefix(CALLBACK_PREFIX)?.strip_prefix(':')?;
    let (version, choice_id) = rest.split_once(':')?;
    if choice_id.is_empty() {
        return None;
    }
    Some((version.parse().ok()?, choice_id))
}

/// One button per quality, then audio only.
pub fn formats_keyboard(choices: &[FormatChoice], version: u32) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = choices
        .iter()
        .map(|choice| {
            vec![InlineKeyboardButton::callback(
                choice.label(),
                format_callback_data(version, &choice.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "🎵 Audio only (mp3)",
        format_callback_data(version, AUDIO_CHOICE),
    )]);
    InlineKeyboardMarkup::new(rows)
}
