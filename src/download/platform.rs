//! Which site a link points at.
//!
//! Detection only tunes the format lookup and its error text; links to
//! other sites are still handed to yt-dlp as is.

use strum::Display;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Platform {
    #[strum(serialize = "YouTube")]
    YouTube,
    #[strum(serialize = "VK")]
    Vk,
    #[strum(serialize = "RuTube")]
    RuTube,
    #[strum(serialize = "other")]
    Other,
}

impl Platform {
    /// Detects the platform from the link host, ignoring `www.` and `m.`.
    ///
    /// # Examples
    /// ```
    /// use mediarelay::download::platform::Platform;
    /// use url::Url;
    ///
    /// let url = Url::parse("https://m.youtube.com/watch?v=abc").unwrap();
    /// assert_eq!(Platform::detect(&url), Platform::YouTube);
    /// ```
    pub fn detect(url: &Url) -> Self {
        let Some(host) = url.host_str() else {
            return Platform::Other;
        };
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let host = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("m."))
            .unwrap_or(host.as_str());

        let on = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));
        if on("youtube.com") || on("youtu.be") || on("youtube-nocookie.com") {
            Platform::YouTube
        } else if on("vk.com") || on("vk.ru") || on("vkvideo.ru") {
            Platform::Vk
        } else if on("rutube.ru") {
            Platform::RuTube
        } else {
            Platform::Other
        }
    }

    /// RuTube often has no per-stream list for the default selector; a second
    /// lookup with `-f best` usually works.
    pub fn retries_with_best(self) -> bool {
        self == Platform::RuTube
    }

    /// Text shown when the format list could not be fetched.
    pub fn lookup_failed_message(self) -> String {
        match self {
            Platform::Other => "⛔ Could not read this link. The site may be unsupported or the video private.".to_string(),
            platform => format!(
                "⛔ Could not get formats from {}. The video may be private, removed or region-locked.",
                platform
            ),
        }
    }
}
