//! Size thresholds and tier classification.

use std::fmt;

use crate::core::error::ConfigError;

/// Bytes in one megabyte as used by every limit in the bot (binary MB, 2^20).
pub const MB_BYTES: u64 = 1024 * 1024;

/// Delivery size thresholds in megabytes.
///
/// Can only be obtained through [`SizePolicy::new`], so every value in
/// circulation satisfies `0 < safe_limit_mb <= hard_limit_mb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    safe_limit_mb: u64,
    hard_limit_mb: u64,
}

impl SizePolicy {
    /// Builds a policy, validating the thresholds.
    ///
    /// # Errors
    /// * [`ConfigError::ZeroLimit`] if either limit is zero
    /// * [`ConfigError::InvertedLimits`] if `safe_limit_mb > hard_limit_mb`
    pub fn new(safe_limit_mb: u64, hard_limit_mb: u64) -> Result<Self, ConfigError> {
        if safe_limit_mb == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "TG_SAFE_LIMIT_MB",
            });
        }
        if hard_limit_mb == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "TG_HARD_LIMIT_MB",
            });
        }
        if safe_limit_mb > hard_limit_mb {
            return Err(ConfigError::InvertedLimits {
                safe_mb: safe_limit_mb,
                hard_mb: hard_limit_mb,
            });
        }
        Ok(Self {
            safe_limit_mb,
            hard_limit_mb,
        })
    }

    pub fn safe_limit_mb(&self) -> u64 {
        self.safe_limit_mb
    }

    pub fn hard_limit_mb(&self) -> u64 {
        self.hard_limit_mb
    }

    /// Upper bound of the safe tier in bytes (inclusive).
    pub fn safe_limit_bytes(&self) -> u64 {
        self.safe_limit_mb.saturating_mul(MB_BYTES)
    }

    /// Upper bound of the best-effort tier in bytes (inclusive).
    pub fn hard_limit_bytes(&self) -> u64 {
        self.hard_limit_mb.saturating_mul(MB_BYTES)
    }
}

/// Size class of a produced artifact.
///
/// Ordered by severity: `Safe < BestEffort < Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Safe,
    BestEffort,
    Rejected,
}

impl Tier {
    /// Marker shown to users next to this tier.
    pub fn marker(self) -> &'static str {
        match self {
            Tier::Safe => "✅",
            Tier::BestEffort => "⚠️",
            Tier::Rejected => "❌",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Safe => "safe",
            Tier::BestEffort => "best_effort",
            Tier::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an artifact size against the policy.
///
/// A size exactly on a threshold belongs to the lower tier.
pub fn classify(size_bytes: u64, policy: &SizePolicy) -> Tier {
    if size_bytes <= policy.safe_limit_bytes() {
        Tier::Safe
    } else if size_bytes <= policy.hard_limit_bytes() {
        Tier::BestEffort
    } else {
        Tier::Rejected
    }
}

/// Formats a byte count as megabytes with one decimal.
pub fn format_mb(size_bytes: u64) -> String {
    format!("{:.1} MB", size_bytes as f64 / MB_BYTES as f64)
}
