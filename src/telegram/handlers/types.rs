//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::UserId;

use crate::core::rate_limiter::RateLimiter;
use crate::delivery::SizePolicy;
use crate::download::jobs::JobRegistry;
use crate::download::pipeline::JobContext;
use crate::telegram::sessions::SessionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub job_context: JobContext,
    pub jobs: JobRegistry,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionStore>,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        job_context: JobContext,
        jobs: JobRegistry,
        rate_limiter: Arc<RateLimiter>,
        sessions: Arc<SessionStore>,
        bot_username: Option<String>,
        bot_id: UserId,
    ) -> Self {
        Self {
            job_context,
            jobs,
            rate_limiter,
            sessions,
            bot_username,
            bot_id,
        }
    }

    pub fn size_policy(&self) -> &SizePolicy {
        &self.job_context.policy
    }
}
