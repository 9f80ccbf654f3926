use clap::{Parser, Subcommand};

use crate::delivery::{format_mb, plan, Artifact, Delivery, MediaKind, SizePolicy, MB_BYTES};

#[derive(Parser)]
#[command(name = "mediarelay")]
#[command(author, version, about = "Telegram bot that fetches media and delivers it within Telegram's size limits", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot with long polling (default)
    Run,

    /// Show how a file of the given size would be delivered
    Plan {
        /// File size in bytes, or with a unit: 120mb, 1.5gb
        #[arg(short, long, value_parser = parse_size)]
        size: u64,

        /// Media kind: video, audio or document
        #[arg(short, long, default_value = "video")]
        kind: MediaKind,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parses `12345`, `12345b`, `120mb`, `1.5gb` (MB = 2^20 bytes).
pub fn parse_size(input: &str) -> Result<u64, String> {
    let lower = input.trim().to_ascii_lowercase();
    let (number, multiplier) = if let Some(n) = lower.strip_suffix("gb") {
        (n, MB_BYTES * 1024)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, MB_BYTES)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        (lower.as_str(), 1)
    };

    let number = number.trim();
    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("size {} is too large", input));
    }
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok((value * multiplier as f64).round() as u64),
        _ => Err(format!("invalid size {:?}, expected bytes or a value like 120mb", input)),
    }
}

/// Human-readable delivery plan for the `plan` subcommand.
pub fn render_plan(size_bytes: u64, kind: MediaKind, policy: &SizePolicy) -> String {
    let artifact = Artifact::new("artifact", size_bytes, kind);
    let (tier, delivery) = plan(&artifact, policy);
    let outcome = match delivery {
        Delivery::Deliver(choice) => format!("{}\n{}", choice.transport.api_method(), choice.annotation()),
        Delivery::Reject(rejection) => rejection.message(),
    };
    format!(
        "size: {} ({} bytes)\nkind: {}\ntier: {} {}\n{}",
        format_mb(size_bytes),
        size_bytes,
        kind,
        tier.marker(),
        tier,
        outcome
    )
}
