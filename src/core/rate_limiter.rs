use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Sliding-window limiter for incoming user messages.
///
/// Each chat may send at most `max_messages` messages within `window`.
/// Refused messages are not recorded, so a user hammering the bot does not
/// extend their own penalty.
#[derive(Clone)]
pub struct RateLimiter {
    /// Timestamps of accepted messages per chat, oldest first
    windows: Arc<Mutex<HashMap<ChatId, VecDeque<Instant>>>>,
    max_messages: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_messages` per `window` for every chat.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mediarelay::core::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(6, Duration::from_secs(10));
    /// ```
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_messages: max_messages.max(1),
            window,
        }
    }

    /// Records a message if the chat is within its budget.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the message is admitted, or `Err(wait)` with the time until
    /// the oldest message in the window expires.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use teloxide::types::ChatId;
    /// use mediarelay::core::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new(6, Duration::from_secs(10));
    /// if let Err(wait) = limiter.check_and_record(ChatId(123456789)).await {
    ///     println!("Too many messages, retry in {:?}", wait);
    /// }
    /// # }
    /// ```
    pub async fn check_and_record(&self, chat_id: ChatId) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(chat_id).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_messages {
            let oldest = timestamps.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Drops chats whose windows are empty. Called periodically from `main`.
    pub async fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        let mut windows = self.windows.lock().await;
        windows.retain(|_, timestamps| {
            timestamps
                .back()
                .map(|&last| now.duration_since(last) < window)
                .unwrap_or(false)
        });
    }

    #[cfg(test)]
    async fn tracked_chats(&self) -> usize {
        self.windows.lock().await.len()
    }
}
