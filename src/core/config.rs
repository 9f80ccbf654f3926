//! Runtime configuration
//!
//! Settings are read once at startup from the process environment (after
//! `.env` has been loaded by `main`) and then passed around explicitly.
//! Nothing in the delivery path reads the environment on its own.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::providers::Env;
use figment::Figment;
use log::LevelFilter;
use secrecy::SecretString;
use serde::Deserialize;

use crate::core::error::ConfigError;
use crate::delivery::SizePolicy;

/// Environment variables read by [`Settings::load`].
pub const ENV_KEYS: [&str; 14] = [
    "BOT_TOKEN",
    "BOT_API_URL",
    "LOG_LEVEL",
    "LOG_FILE_PATH",
    "TEMP_ROOT",
    "YTDL_BIN",
    "FFPROBE_BIN",
    "TOOL_TIMEOUT_SECS",
    "MAX_PARALLEL_DOWNLOADS",
    "MAX_ACTIVE_JOBS_PER_USER",
    "RATE_LIMIT_PER_USER",
    "RATE_LIMIT_WINDOW_SEC",
    "TG_SAFE_LIMIT_MB",
    "TG_HARD_LIMIT_MB",
];

/// Default upper bound of the reliable tier (standard Bot API upload limit)
pub const DEFAULT_SAFE_LIMIT_MB: u64 = 50;

/// Default upper bound of the best-effort tier (local Bot API server ceiling)
pub const DEFAULT_HARD_LIMIT_MB: u64 = 2000;

/// Settings exactly as they come out of the environment, before validation.
#[derive(Debug, Deserialize)]
struct RawSettings {
    bot_token: Option<String>,
    bot_api_url: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_file_path")]
    log_file_path: String,
    #[serde(default = "default_temp_root")]
    temp_root: String,
    #[serde(default = "default_ytdl_bin")]
    ytdl_bin: String,
    #[serde(default = "default_ffprobe_bin")]
    ffprobe_bin: String,
    #[serde(default = "default_tool_timeout_secs")]
    tool_timeout_secs: u64,
    #[serde(default = "default_max_parallel_downloads")]
    max_parallel_downloads: usize,
    #[serde(default = "default_max_active_jobs_per_user")]
    max_active_jobs_per_user: usize,
    #[serde(default = "default_rate_limit_per_user")]
    rate_limit_per_user: usize,
    #[serde(default = "default_rate_limit_window_sec")]
    rate_limit_window_sec: u64,
    #[serde(default = "default_safe_limit_mb")]
    tg_safe_limit_mb: u64,
    #[serde(default = "default_hard_limit_mb")]
    tg_hard_limit_mb: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_path() -> String {
    "mediarelay.log".to_string()
}

fn default_temp_root() -> String {
    "./.tmp".to_string()
}

fn default_ytdl_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    900
}

fn default_max_parallel_downloads() -> usize {
    2
}

fn default_max_active_jobs_per_user() -> usize {
    1
}

fn default_rate_limit_per_user() -> usize {
    6
}

fn default_rate_limit_window_sec() -> u64 {
    10
}

fn default_safe_limit_mb() -> u64 {
    DEFAULT_SAFE_LIMIT_MB
}

fn default_hard_limit_mb() -> u64 {
    DEFAULT_HARD_LIMIT_MB
}

/// Paths and timeouts of the external toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub ytdl_bin: String,
    pub ffprobe_bin: String,
    pub timeout: Duration,
}

/// Admission limits applied before a job starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSettings {
    pub max_parallel_downloads: usize,
    pub max_active_jobs_per_user: usize,
    pub rate_limit_per_user: usize,
    pub rate_limit_window: Duration,
}

/// Validated application settings.
#[derive(Debug)]
pub struct Settings {
    pub bot_token: SecretString,
    pub bot_api_url: Option<url::Url>,
    pub log_level: LevelFilter,
    pub log_file_path: PathBuf,
    pub temp_root: PathBuf,
    pub tools: ToolSettings,
    pub admission: AdmissionSettings,
    pub size_policy: SizePolicy,
}

impl Settings {
    /// Loads and validates settings from the process environment.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for missing or invalid values; callers treat it as fatal.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(env_figment())
    }

    /// Loads settings from an arbitrary figment (used by tests and by [`Settings::load`]).
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw = extract(&figment)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let size_policy = SizePolicy::new(raw.tg_safe_limit_mb, raw.tg_hard_limit_mb)?;

        let token = raw
            .bot_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        validate_token(&token)?;

        let bot_api_url = match raw.bot_api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(url::Url::parse(url).map_err(|e| ConfigError::Invalid {
                name: "BOT_API_URL",
                reason: e.to_string(),
            })?),
            _ => None,
        };

        let log_level = LevelFilter::from_str(raw.log_level.trim()).map_err(|_| ConfigError::Invalid {
            name: "LOG_LEVEL",
            reason: format!("unknown level {:?}", raw.log_level),
        })?;

        if raw.temp_root.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "TEMP_ROOT",
                reason: "must be a directory path".to_string(),
            });
        }

        require_positive("TOOL_TIMEOUT_SECS", raw.tool_timeout_secs)?;
        require_positive("MAX_PARALLEL_DOWNLOADS", raw.max_parallel_downloads as u64)?;
        require_positive("MAX_ACTIVE_JOBS_PER_USER", raw.max_active_jobs_per_user as u64)?;
        require_positive("RATE_LIMIT_PER_USER", raw.rate_limit_per_user as u64)?;
        require_positive("RATE_LIMIT_WINDOW_SEC", raw.rate_limit_window_sec)?;

        Ok(Self {
            bot_token: SecretString::from(token),
            bot_api_url,
            log_level,
            log_file_path: PathBuf::from(raw.log_file_path),
            temp_root: PathBuf::from(raw.temp_root),
            tools: ToolSettings {
                ytdl_bin: raw.ytdl_bin,
                ffprobe_bin: raw.ffprobe_bin,
                timeout: Duration::from_secs(raw.tool_timeout_secs),
            },
            admission: AdmissionSettings {
                max_parallel_downloads: raw.max_parallel_downloads,
                max_active_jobs_per_user: raw.max_active_jobs_per_user,
                rate_limit_per_user: raw.rate_limit_per_user,
                rate_limit_window: Duration::from_secs(raw.rate_limit_window_sec),
            },
            size_policy,
        })
    }
}

/// Loads only the size thresholds. Does not require `BOT_TOKEN`.
pub fn load_size_policy() -> Result<SizePolicy, ConfigError> {
    size_policy_from_figment(env_figment())
}

pub fn size_policy_from_figment(figment: Figment) -> Result<SizePolicy, ConfigError> {
    let raw = extract(&figment)?;
    SizePolicy::new(raw.tg_safe_limit_mb, raw.tg_hard_limit_mb)
}

fn env_figment() -> Figment {
    Figment::new().merge(Env::raw().only(&ENV_KEYS))
}

fn extract(figment: &Figment) -> Result<RawSettings, ConfigError> {
    figment.extract::<RawSettings>().map_err(|e| ConfigError::Invalid {
        name: "environment",
        reason: e.to_string(),
    })
}

fn require_positive(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be >= 1".to_string(),
        });
    }
    Ok(())
}

/// Telegram tokens look like `<numeric bot id>:<secret>`.
fn validate_token(token: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "BOT_TOKEN",
        reason: "expected Telegram token format <id>:<secret>".to_string(),
    };
    let (id, secret) = token.split_once(':').ok_or_else(invalid)?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) || secret.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

/// Retry configuration for reliable-tier uploads
pub mod retry {
    use std::time::Duration;

    /// Extra attempts after the first one, network errors only
    pub const MAX_UPLOAD_RETRIES: usize = 2;

    /// Delay before the first retry (in seconds)
    pub const INITIAL_DELAY_SECS: u64 = 1;

    /// Upper bound for a single backoff delay (in seconds)
    pub const MAX_DELAY_SECS: u64 = 10;

    /// Longest flood-control wait honoured before giving up (in seconds)
    pub const MAX_FLOOD_WAIT_SECS: u64 = 60;

    pub fn initial_delay() -> Duration {
        Duration::from_secs(INITIAL_DELAY_SECS)
    }

    pub fn max_delay() -> Duration {
        Duration::from_secs(MAX_DELAY_SECS)
    }

    pub fn max_flood_wait() -> Duration {
        Duration::from_secs(MAX_FLOOD_WAIT_SECS)
    }
}

/// Network configuration
pub mod network {
    use std::time::Duration;

    /// Request timeout for Bot API requests (in seconds)
    /// 15 minutes so multi-hundred-MB uploads through a local Bot API server can finish
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Format-choice sessions
pub mod sessions {
    use std::time::Duration;

    /// How long a format keyboard stays usable (in seconds)
    pub const SESSION_TTL_SECS: u64 = 600;

    pub fn ttl() -> Duration {
        Duration::from_secs(SESSION_TTL_SECS)
    }
}

/// Validation configuration
pub mod validation {
    /// Maximum URL length (RFC 7230 recommends 8000, but we use 2048 for safety)
    pub const MAX_URL_LENGTH: usize = 2048;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn base() -> Figment {
        Figment::new().merge(("bot_token", "123456:ABC-def"))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_figment(base()).unwrap();

        assert_eq!(settings.bot_token.expose_secret(), "123456:ABC-def");
        assert_eq!(settings.size_policy, SizePolicy::new(50, 2000).unwrap());
        assert_eq!(settings.log_level, LevelFilter::Info);
        assert_eq!(settings.temp_root, PathBuf::from("./.tmp"));
        assert_eq!(settings.tools.ytdl_bin, "yt-dlp");
        assert_eq!(settings.tools.timeout, Duration::from_secs(900));
        assert_eq!(settings.admission.max_parallel_downloads, 2);
        assert_eq!(settings.admission.max_active_jobs_per_user, 1);
        assert_eq!(settings.admission.rate_limit_window, Duration::from_secs(10));
        assert!(settings.bot_api_url.is_none());
    }

    #[test]
    fn test_custom_limits() {
        let figment = base().merge(("tg_safe_limit_mb", 100)).merge(("tg_hard_limit_mb", 1500));
        let settings = Settings::from_figment(figment).unwrap();
        assert_eq!(settings.size_policy.safe_limit_mb(), 100);
        assert_eq!(settings.size_policy.hard_limit_mb(), 1500);
    }

    #[test]
    fn test_inverted_limits_are_fatal() {
        let figment = base().merge(("tg_safe_limit_mb", 3000)).merge(("tg_hard_limit_mb", 2000));
        assert_eq!(
            Settings::from_figment(figment).unwrap_err(),
            ConfigError::InvertedLimits {
                safe_mb: 3000,
                hard_mb: 2000
            }
        );
    }

    #[test]
    fn test_zero_limit_is_fatal() {
        let figment = base().merge(("tg_safe_limit_mb", 0));
        assert!(matches!(
            Settings::from_figment(figment),
            Err(ConfigError::ZeroLimit { .. })
        ));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            Settings::from_figment(Figment::new()).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
    }

    #[test]
    fn test_malformed_token() {
        let figment = Figment::new().merge(("bot_token", "not-a-token"));
        assert!(matches!(
            Settings::from_figment(figment),
            Err(ConfigError::Invalid { name: "BOT_TOKEN", .. })
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let figment = base().merge(("log_level", "loud"));
        assert!(matches!(
            Settings::from_figment(figment),
            Err(ConfigError::Invalid { name: "LOG_LEVEL", .. })
        ));
    }

    #[test]
    fn test_zero_parallel_downloads() {
        let figment = base().merge(("max_parallel_downloads", 0));
        assert!(matches!(
            Settings::from_figment(figment),
            Err(ConfigError::Invalid {
                name: "MAX_PARALLEL_DOWNLOADS",
                ..
            })
        ));
    }

    #[test]
    fn test_size_policy_without_token() {
        let figment = Figment::new().merge(("tg_safe_limit_mb", 10));
        assert_eq!(
            size_policy_from_figment(figment).unwrap(),
            SizePolicy::new(10, 2000).unwrap()
        );
    }

    #[test]
    fn test_bot_api_url_parsed() {
        let figment = base().merge(("bot_api_url", "http://localhost:8081"));
        let settings = Settings::from_figment(figment).unwrap();
        assert_eq!(settings.bot_api_url.unwrap().as_str(), "http://localhost:8081/");
    }
}
