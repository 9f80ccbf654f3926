//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the effective configuration

use std::fs::File;
use std::path::Path;

use anyhow::Result;
use simplelog::*;

use crate::core::config::Settings;
use crate::delivery::tier_legend;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `level` - Maximum level written to both sinks
/// * `log_file_path` - Path to the log file (truncated on start)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already installed
pub fn init_logger(level: LevelFilter, log_file_path: &Path) -> Result<()> {
    let log_file = File::create(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", log_file_path.display(), e))?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Initialize a console-only logger (CLI subcommands that should not touch the log file).
pub fn init_console_logger(level: LevelFilter) -> Result<()> {
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))
}

/// Logs the effective configuration at startup. The bot token is never printed.
pub fn log_startup_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Delivery policy");
    for line in tier_legend(&settings.size_policy).lines() {
        log::info!("  {}", line);
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match &settings.bot_api_url {
        Some(url) => log::info!("Bot API: {}", url),
        None => log::info!("Bot API: api.telegram.org"),
    }
    if settings.size_policy.hard_limit_mb() > 50 && settings.bot_api_url.is_none() {
        log::warn!(
            "TG_HARD_LIMIT_MB={} but no local Bot API server is configured; best-effort uploads above 50 MB will likely fail",
            settings.size_policy.hard_limit_mb()
        );
    }
    log::info!(
        "Toolchain: yt-dlp={}, ffprobe={}, timeout={}s",
        settings.tools.ytdl_bin,
        settings.tools.ffprobe_bin,
        settings.tools.timeout.as_secs()
    );
    log::info!(
        "Admission: {} parallel downloads, {} active job(s) per user, {} messages per {}s",
        settings.admission.max_parallel_downloads,
        settings.admission.max_active_jobs_per_user,
        settings.admission.rate_limit_per_user,
        settings.admission.rate_limit_window.as_secs()
    );
    log::info!("Temp root: {}", settings.temp_root.display());
}
