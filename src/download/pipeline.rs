//! Job pipeline orchestrator.
//!
//! One job runs:
//!   wait for a download slot → fetch → classify and select transport
//!   → reject, or upload reliably / best-effort → cleanup
//!
//! A rejected artifact never reaches [`Courier::upload`]. Best-effort uploads
//! are attempted exactly once. The job directory is removed on every path.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use teloxide::types::ChatId;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::delivery::{format_mb, plan, Artifact, Confidence, Delivery, SizePolicy, Tier, Transport, TransportChoice};
use crate::download::courier::{Courier, UploadError};
use crate::download::fetcher::{FetchRequest, Fetcher};
use crate::download::jobs::JobHandle;
use crate::download::temp_storage::TempStorage;

/// Backoff for reliable-tier uploads. Only network errors and flood control are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRetry {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// A flood-control wait longer than this ends the retries
    pub max_flood_wait: Duration,
}

impl Default for UploadRetry {
    fn default() -> Self {
        Self {
            max_retries: config::retry::MAX_UPLOAD_RETRIES,
            min_delay: config::retry::initial_delay(),
            max_delay: config::retry::max_delay(),
            max_flood_wait: config::retry::max_flood_wait(),
        }
    }
}

impl UploadRetry {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Delay before the next attempt: Telegram's flood-control wait replaces
    /// the backoff delay, `None` stops retrying.
    pub fn next_delay(&self, err: &UploadError, backoff: Option<Duration>) -> Option<Duration> {
        match err {
            UploadError::FloodControl(wait) if *wait > self.max_flood_wait => None,
            UploadError::FloodControl(wait) => backoff.map(|_| *wait),
            _ => backoff,
        }
    }
}

/// Everything a job needs besides its own request. Cheap to clone.
#[derive(Clone)]
pub struct JobContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub courier: Arc<dyn Courier>,
    pub storage: TempStorage,
    pub policy: SizePolicy,
    pub retry: UploadRetry,
}

/// A registered job and what to fetch.
pub struct Job {
    pub handle: JobHandle,
    pub request: FetchRequest,
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered { tier: Tier, transport: Transport },
    Rejected,
    BestEffortFailed,
    Failed,
    Cancelled,
}

/// Status texts shown while a job progresses.
pub mod status {
    pub const QUEUED: &str = "⏳ Queued, waiting for a free slot...";
    pub const DOWNLOADING: &str = "⬇️ Downloading...";
    pub const CANCELLED: &str = "⛔ Cancelled.";
    pub const BEST_EFFORT_FAILED: &str =
        "⚠️ The file may not have gone through: Telegram did not confirm the upload. I won't retry it automatically.";
}

/// Runs a job to completion and always removes its temp directory.
pub async fn run_job(ctx: &JobContext, job: Job) -> JobOutcome {
    let job_id = job.handle.id().to_string();
    let chat_id = job.handle.chat_id();
    log::info!(
        "Job {} started for chat {}: {} ({})",
        job_id,
        chat_id,
        job.request.url,
        job.request.kind
    );

    let outcome = match process(ctx, &job).await {
        Ok(outcome) => outcome,
        Err(AppError::Cancelled) => {
            log::info!("Job {} cancelled", job_id);
            ctx.courier.notify(chat_id, status::CANCELLED).await;
            JobOutcome::Cancelled
        }
        Err(e) => {
            log::error!(
                "Job {} failed [{}] (fetcher: {}): {}",
                job_id,
                e.category(),
                ctx.fetcher.name(),
                e
            );
            ctx.courier.notify(chat_id, &e.user_message()).await;
            JobOutcome::Failed
        }
    };

    ctx.storage.cleanup(&job_id).await;
    log::info!("Job {} finished: {:?}", job_id, outcome);
    outcome
}

async fn process(ctx: &JobContext, job: &Job) -> AppResult<JobOutcome> {
    let handle = &job.handle;
    let chat_id = handle.chat_id();

    let permit = match handle.try_acquire_download_slot() {
        Some(permit) => permit,
        None => {
            ctx.courier.notify(chat_id, status::QUEUED).await;
            handle.acquire_download_slot().await?
        }
    };

    ctx.courier.notify(chat_id, status::DOWNLOADING).await;
    let dir = ctx.storage.allocate(handle.id()).await?;
    let artifact = ctx.fetcher.fetch(&job.request, &dir, handle.cancel_token()).await?;
    drop(permit);

    if handle.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let (tier, delivery) = plan(&artifact, &ctx.policy);
    log::info!(
        "Job {}: {} {} → tier={} transport={}",
        handle.id(),
        artifact.file_name(),
        format_mb(artifact.size_bytes),
        tier,
        delivery.transport().map(|t| t.api_method()).unwrap_or("none")
    );

    match delivery {
        Delivery::Reject(rejection) => {
            ctx.courier.notify(chat_id, &rejection.message()).await;
            Ok(JobOutcome::Rejected)
        }
        Delivery::Deliver(choice) => match choice.confidence {
            Confidence::Reliable => deliver_reliable(ctx, chat_id, &artifact, tier, choice).await,
            Confidence::BestEffort => Ok(deliver_best_effort(ctx, chat_id, &artifact, tier, choice).await),
        },
    }
}

async fn deliver_reliable(
    ctx: &JobContext,
    chat_id: ChatId,
    artifact: &Artifact,
    tier: Tier,
    choice: TransportChoice,
) -> AppResult<JobOutcome> {
    ctx.courier.notify(chat_id, &choice.annotation()).await;

    let transport = match upload_with_retry(ctx, chat_id, artifact, choice.transport).await {
        Ok(()) => choice.transport,
        Err(UploadError::Rejected(reason)) if choice.transport.is_kind_specific() => {
            log::warn!(
                "{} rejected ({}), falling back to {}",
                choice.transport.api_method(),
                reason,
                Transport::Document.api_method()
            );
            upload_with_retry(ctx, chat_id, artifact, Transport::Document).await?;
            Transport::Document
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("Delivered {} via {}", artifact.file_name(), transport.api_method());
    Ok(JobOutcome::Delivered { tier, transport })
}

async fn deliver_best_effort(
    ctx: &JobContext,
    chat_id: ChatId,
    artifact: &Artifact,
    tier: Tier,
    choice: TransportChoice,
) -> JobOutcome {
    ctx.courier.notify(chat_id, &choice.annotation()).await;

    match ctx.courier.upload(chat_id, artifact, choice.transport).await {
        Ok(()) => {
            log::info!("Best-effort upload of {} went through", artifact.file_name());
            JobOutcome::Delivered {
                tier,
                transport: choice.transport,
            }
        }
        Err(e) => {
            log::warn!("Best-effort upload of {} failed: {}", artifact.file_name(), e);
            ctx.courier.notify(chat_id, status::BEST_EFFORT_FAILED).await;
            JobOutcome::BestEffortFailed
        }
    }
}

async fn upload_with_retry(
    ctx: &JobContext,
    chat_id: ChatId,
    artifact: &Artifact,
    transport: Transport,
) -> Result<(), UploadError> {
    let courier = &ctx.courier;
    let retry = ctx.retry;
    (|| async move { courier.upload(chat_id, artifact, transport).await })
        .retry(retry.backoff())
        .when(UploadError::is_retryable)
        .adjust(move |err: &UploadError, backoff: Option<Duration>| retry.next_delay(err, backoff))
        .notify(|err: &UploadError, dur: Duration| {
            log::warn!("{} failed ({}), retrying in {:?}", transport.api_method(), err, dur);
        })
        .await
}
