//! Mapping of (kind, tier) to a Bot API upload method.

use std::fmt;

use super::artifact::MediaKind;
use super::policy::{format_mb, Tier};

/// Bot API method used to deliver a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// `sendVideo`
    Video,
    /// `sendAudio`
    Audio,
    /// `sendDocument`, the most permissive method
    Document,
}

impl Transport {
    /// Name of the Bot API method.
    pub fn api_method(self) -> &'static str {
        match self {
            Transport::Video => "sendVideo",
            Transport::Audio => "sendAudio",
            Transport::Document => "sendDocument",
        }
    }

    pub fn is_kind_specific(self) -> bool {
        !matches!(self, Transport::Document)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_method())
    }
}

/// How confident we are that the upload will go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    Reliable,
    BestEffort,
}

impl Confidence {
    pub fn marker(self) -> &'static str {
        match self {
            Confidence::Reliable => "✅",
            Confidence::BestEffort => "⚠️",
        }
    }
}

/// Selected upload method plus the confidence annotation shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportChoice {
    pub transport: Transport,
    pub confidence: Confidence,
}

impl TransportChoice {
    /// User-facing note sent before (or together with) the upload.
    pub fn annotation(&self) -> String {
        match self.confidence {
            Confidence::Reliable => format!("{} Within the safe size, sending it now.", self.confidence.marker()),
            Confidence::BestEffort => format!(
                "{} The file is large. I'll send it as a document, but Telegram may not accept it.",
                self.confidence.marker()
            ),
        }
    }
}

/// An artifact above the hard limit. It is never uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub size_bytes: Option<u64>,
    pub hard_limit_mb: Option<u64>,
}

impl Rejection {
    /// Rejection without size details.
    pub fn over_hard_limit() -> Self {
        Self {
            size_bytes: None,
            hard_limit_mb: None,
        }
    }

    pub fn with_details(size_bytes: u64, hard_limit_mb: u64) -> Self {
        Self {
            size_bytes: Some(size_bytes),
            hard_limit_mb: Some(hard_limit_mb),
        }
    }

    /// Text sent to the user instead of the file.
    pub fn message(&self) -> String {
        let marker = Tier::Rejected.marker();
        match (self.size_bytes, self.hard_limit_mb) {
            (Some(size), Some(limit)) => format!(
                "{} The file is {} which is over the {} MB limit for bots. It will not be sent; try a lower quality or audio only.",
                marker,
                format_mb(size),
                limit
            ),
            _ => format!(
                "{} The file is over the Telegram limit for bots. It will not be sent; try a lower quality or audio only.",
                marker
            ),
        }
    }
}

/// Outcome of transport selection.
///
/// A rejected artifact carries no transport at all, so there is nothing a
/// caller could upload by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Deliver(TransportChoice),
    Reject(Rejection),
}

impl Delivery {
    pub fn transport(&self) -> Option<Transport> {
        match self {
            Delivery::Deliver(choice) => Some(choice.transport),
            Delivery::Reject(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Delivery::Reject(_))
    }
}

/// Picks the upload method for an artifact of `kind` in `tier`.
///
/// Best-effort files always go out as documents: `sendVideo`/`sendAudio`
/// validate size and format more strictly than `sendDocument`.
pub fn select_transport(kind: MediaKind, tier: Tier) -> Delivery {
    match tier {
        Tier::Rejected => Delivery::Reject(Rejection::over_hard_limit()),
        Tier::BestEffort => Delivery::Deliver(TransportChoice {
            transport: Transport::Document,
            confidence: Confidence::BestEffort,
        }),
        Tier::Safe => Delivery::Deliver(TransportChoice {
            transport: kind_transport(kind),
            confidence: Confidence::Reliable,
        }),
    }
}

fn kind_transport(kind: MediaKind) -> Transport {
    match kind {
        MediaKind::Video => Transport::Video,
        MediaKind::Audio => Transport::Audio,
        MediaKind::DocumentFallback => Transport::Document,
    }
}
