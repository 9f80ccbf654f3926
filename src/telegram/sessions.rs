//! Pending format choices, one per chat.
//!
//! Sending a link opens a session holding the offered choices. Buttons carry
//! the session version, so taps on an older keyboard (or after the TTL) are
//! refused instead of starting a download the user no longer expects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use teloxide::types::ChatId;
use thiserror::Error;
use url::Url;

use crate::delivery::FormatChoice;
use crate::download::platform::Platform;

/// What a keyboard button asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Video(FormatChoice),
    Audio,
}

/// A resolved button tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picked {
    pub url: Url,
    pub platform: Platform,
    pub pick: Pick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("format session expired")]
    Expired,
    #[error("unknown format choice")]
    UnknownChoice,
}

impl SessionError {
    pub fn user_message(self) -> &'static str {
        match self {
            SessionError::Expired => "⌛ This menu has expired. Send the link again.",
            SessionError::UnknownChoice => "❌ This option is no longer available. Send the link again.",
        }
    }
}

struct FormatSession {
    version: u32,
    url: Url,
    platform: Platform,
    choices: Vec<FormatChoice>,
    opened_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    next_version: AtomicU32,
    sessions: Mutex<HashMap<ChatId, FormatSession>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_version: AtomicU32::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ChatId, FormatSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the chat's session and returns its version.
    pub fn open(&self, chat_id: ChatId, url: Url, platform: Platform, choices: Vec<FormatChoice>) -> u32 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let session = FormatSession {
            version,
            url,
            platform,
            choices,
            opened_at: Instant::now(),
        };
        self.sessions().insert(chat_id, session);
        version
    }

    /// Resolves a tap on a keyboard of the given version.
    ///
    /// # Errors
    /// * [`SessionError::Expired`] - no session, a newer one replaced it, or the TTL passed
    /// * [`SessionError::UnknownChoice`] - the session never offered `choice_id`
    pub fn pick(&self, chat_id: ChatId, version: u32, choice_id: &str) -> Result<Picked, SessionError> {
        let sessions = self.sessions();
        let session = sessions
            .get(&chat_id)
            .filter(|s| s.version == version && s.opened_at.elapsed() <= self.ttl)
            .ok_or(SessionError::Expired)?;

        let pick = if choice_id == super::keyboards::AUDIO_CHOICE {
            Pick::Audio
        } else {
            let choice = session
                .choices
                .iter()
                .find(|c| c.id == choice_id)
                .ok_or(SessionError::UnknownChoice)?;
            Pick::Video(choice.clone())
        };

        Ok(Picked {
            url: session.url.clone(),
            platform: session.platform,
            pick,
        })
    }

    /// Drops sessions past their TTL.
    pub fn prune(&self) {
        let ttl = self.ttl;
        self.sessions().retain(|_, s| s.opened_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
