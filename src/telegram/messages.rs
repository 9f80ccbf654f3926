//! User-facing texts

use indoc::formatdoc;

use crate::delivery::{tier_legend, FormatChoice, SizePolicy, Tier};

/// Greeting and usage shown for /start and /help.
pub fn help_text(policy: &SizePolicy) -> String {
    formatdoc! {"
        👋 Send me a link and I'll fetch the media for you.

        • a link on its own: pick a quality, or audio only
        • /audio <link>: audio only (mp3)
        • /cancel: stop your current download

        What happens with large files:
        {legend}",
        legend = tier_legend(policy),
    }
}

pub const AUDIO_USAGE: &str = "Usage: /audio <link>";

pub const NO_LINK: &str = "🔗 Send me a link (http:// or https://) to a video.";

pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

pub const CANCEL_REQUESTED: &str = "⛔ Stopping your download...";

pub fn rate_limited(wait_secs: u64) -> String {
    format!("🐢 Too many messages. Try again in {}s.", wait_secs.max(1))
}

pub const LOOKING_UP: &str = "🔎 Looking up available formats...";

pub const NO_FORMAT_LIST: &str = "⬇️ No quality list for this link, fetching the best available.";

pub const AUDIO_ONLY_LABEL: &str = "🎵 Audio only (mp3)";

/// Text above the format keyboard.
pub fn format_menu(title: Option<&str>, choices: &[FormatChoice], policy: &SizePolicy) -> String {
    let heading = match title {
        Some(title) => format!("🎬 {}", title),
        None => "🎬 Choose a format".to_string(),
    };
    if choices.is_empty() {
        return format!(
            "{}\n\n{} Every video quality is over {} MB, so only audio can be sent.",
            heading,
            Tier::Rejected.marker(),
            policy.hard_limit_mb()
        );
    }
    format!(
        "{}\n\n{} sent as video, reliable\n{} sent as a document, may fail\nQualities over {} MB are not offered.",
        heading,
        Tier::Safe.marker(),
        Tier::BestEffort.marker(),
        policy.hard_limit_mb()
    )
}

pub fn format_chosen(label: &str) -> String {
    format!("Format: {}\n⏳ Starting...", label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_contains_legend() {
        let policy = SizePolicy::new(50, 2000).unwrap();
        let text = help_text(&policy);

        assert!(text.starts_with("👋"));
        assert!(text.contains("/audio <link>"));
        assert!(text.contains("✅ up to 50 MB"));
        assert!(text.contains("❌ over 2000 MB"));
    }

    #[test]
    fn test_format_menu_when_everything_is_too_large() {
        let policy = SizePolicy::new(50, 2000).unwrap();
        let text = format_menu(Some("Clip"), &[], &policy);

        assert!(text.starts_with("🎬 Clip"));
        assert!(text.contains("❌ Every video quality is over 2000 MB"));
    }

    #[test]
    fn test_rate_limited_never_says_zero() {
        assert_eq!(rate_limited(0), "🐢 Too many messages. Try again in 1s.");
        assert_eq!(rate_limited(7), "🐢 Too many messages. Try again in 7s.");
    }
}
