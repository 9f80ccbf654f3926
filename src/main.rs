use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use log::LevelFilter;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::time::interval;

use mediarelay::cli::{render_plan, Cli, Commands};
use mediarelay::core::config::{self, Settings};
use mediarelay::core::logging::{init_console_logger, init_logger, log_startup_configuration};
use mediarelay::core::rate_limiter::RateLimiter;
use mediarelay::delivery::MediaKind;
use mediarelay::download::{JobContext, JobRegistry, TempStorage, UploadRetry, YtDlpFetcher};
use mediarelay::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, SessionStore, TelegramCourier};

/// How often idle rate-limiter windows and stale format sessions are dropped
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Main entry point
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Plan { size, kind }) => run_plan(size, kind),
        Some(Commands::Run) | None => run_bot().await,
    }
}

/// Prints the delivery plan for a size using the configured limits. Needs no token.
fn run_plan(size: u64, kind: MediaKind) -> Result<()> {
    init_console_logger(LevelFilter::Warn)?;
    let policy = config::load_size_policy()?;
    println!("{}", render_plan(size, kind, &policy));
    Ok(())
}

async fn run_bot() -> Result<()> {
    // Invalid limits or a missing token stop the process here
    let settings = Settings::load()?;

    init_logger(settings.log_level, &settings.log_file_path)?;
    log_startup_configuration(&settings);

    let storage = TempStorage::start(&settings.temp_root).await?;

    let bot = create_bot(&settings)?;
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();
    let bot_id = me.id;
    log::info!("Authorized as @{}", bot_username.as_deref().unwrap_or("unknown"));

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let rate_limiter = Arc::new(RateLimiter::new(
        settings.admission.rate_limit_per_user,
        settings.admission.rate_limit_window,
    ));
    let jobs = JobRegistry::new(
        settings.admission.max_parallel_downloads,
        settings.admission.max_active_jobs_per_user,
    );
    let job_context = JobContext {
        fetcher: Arc::new(YtDlpFetcher::new(settings.tools.clone())),
        courier: Arc::new(TelegramCourier::new(bot.clone())),
        storage,
        policy: settings.size_policy,
        retry: UploadRetry::default(),
    };

    let sessions = Arc::new(SessionStore::new(config::sessions::ttl()));
    let limiter_prune = Arc::clone(&rate_limiter);
    let sessions_prune = Arc::clone(&sessions);
    tokio::spawn(async move {
        let mut interval = interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter_prune.prune().await;
            sessions_prune.prune();
        }
    });

    let handler = schema(HandlerDeps::new(job_context, jobs, rate_limiter, sessions, bot_username, bot_id));

    log::info!("Starting bot in long polling mode");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
