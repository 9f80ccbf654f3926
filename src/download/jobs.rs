//! Admission and cancellation of download jobs.
//!
//! Two limits apply:
//! - per user: at most `max_active_per_user` jobs at once, refused up front
//! - global: at most `max_parallel_downloads` external tool runs at once;
//!   extra jobs wait for a slot and show as queued
//!
//! Every job carries a [`CancellationToken`]; `/cancel` fires the tokens of
//! all jobs of that user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use teloxide::types::ChatId;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("user already has {active} active job(s), limit is {limit}")]
    TooManyActive { active: usize, limit: usize },
}

impl AdmissionError {
    pub fn user_message(&self) -> String {
        match self {
            AdmissionError::TooManyActive { .. } => {
                "⏳ Your previous download is still running. Wait for it to finish or send /cancel.".to_string()
            }
        }
    }
}

#[derive(Debug)]
struct ActiveJob {
    id: String,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct RegistryInner {
    active: Mutex<HashMap<ChatId, Vec<ActiveJob>>>,
    downloads: Arc<Semaphore>,
    max_active_per_user: usize,
}

impl RegistryInner {
    // A poisoned map is still consistent: every mutation is a single push or retain
    fn active(&self) -> MutexGuard<'_, HashMap<ChatId, Vec<ActiveJob>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn unregister(&self, chat_id: ChatId, job_id: &str) {
        let mut active = self.active();
        if let Some(jobs) = active.get_mut(&chat_id) {
            jobs.retain(|job| job.id != job_id);
            if jobs.is_empty() {
                active.remove(&chat_id);
            }
        }
    }
}

/// Shared registry of running jobs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl JobRegistry {
    /// # Arguments
    /// * `max_parallel_downloads` - global bound on concurrent tool runs
    /// * `max_active_per_user` - jobs a single user may have in flight
    pub fn new(max_parallel_downloads: usize, max_active_per_user: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                active: Mutex::new(HashMap::new()),
                downloads: Arc::new(Semaphore::new(max_parallel_downloads.max(1))),
                max_active_per_user: max_active_per_user.max(1),
            }),
        }
    }

    /// Registers a new job for `chat_id` unless the user is at their limit.
    ///
    /// The job stays registered until the returned handle is dropped.
    pub fn try_start(&self, chat_id: ChatId) -> Result<JobHandle, AdmissionError> {
        let mut active = self.inner.active();
        let jobs = active.entry(chat_id).or_default();
        if jobs.len() >= self.inner.max_active_per_user {
            return Err(AdmissionError::TooManyActive {
                active: jobs.len(),
                limit: self.inner.max_active_per_user,
            });
        }

        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        jobs.push(ActiveJob {
            id: id.clone(),
            cancel: cancel.clone(),
        });
        log::debug!("Job {} registered for chat {}", id, chat_id);

        Ok(JobHandle {
            id,
            chat_id,
            cancel,
            registry: Arc::clone(&self.inner),
        })
    }

    /// Cancels every active job of `chat_id`. Returns `false` if there was none.
    pub fn cancel(&self, chat_id: ChatId) -> bool {
        let active = self.inner.active();
        match active.get(&chat_id) {
            Some(jobs) if !jobs.is_empty() => {
                for job in jobs {
                    log::info!("Cancelling job {} for chat {}", job.id, chat_id);
                    job.cancel.cancel();
                }
                true
            }
            _ => false,
        }
    }

    pub fn active_jobs(&self, chat_id: ChatId) -> usize {
        self.inner.active().get(&chat_id).map(Vec::len).unwrap_or(0)
    }

    /// Free global download slots right now.
    pub fn available_download_slots(&self) -> usize {
        self.inner.downloads.available_permits()
    }
}

/// A registered job. Dropping it unregisters the job.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    chat_id: ChatId,
    cancel: CancellationToken,
    registry: Arc<RegistryInner>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Takes a global download slot if one is free right now.
    pub fn try_acquire_download_slot(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.registry.downloads).try_acquire_owned().ok()
    }

    /// Waits for a global download slot, giving up if the job is cancelled meanwhile.
    pub async fn acquire_download_slot(&self) -> AppResult<OwnedSemaphorePermit> {
        let downloads = Arc::clone(&self.registry.downloads);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            permit = downloads.acquire_owned() => permit.map_err(|_| AppError::Cancelled),
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.registry.unregister(self.chat_id, &self.id);
        log::debug!("Job {} unregistered", self.id);
    }
}
