//! Test doubles for the job pipeline
//!
//! - `StubFetcher` writes a sparse file of the requested size instead of running yt-dlp,
//!   and answers format lookups from a fixed stream list
//! - `RecordingCourier` records notifications and uploads and replays scripted upload results

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use teloxide::types::ChatId;
use tokio_util::sync::CancellationToken;
use url::Url;

use mediarelay::core::error::{AppError, AppResult};
use mediarelay::delivery::formats::{AudioCodec, VideoCodec};
use mediarelay::delivery::{Artifact, MediaKind, RawFormat, Transport, MB_BYTES};
use mediarelay::download::courier::{Courier, UploadError};
use mediarelay::download::error::DownloadError;
use mediarelay::download::fetcher::{FetchRequest, Fetcher, MediaInfo};
use mediarelay::download::platform::Platform;

#[derive(Debug, Clone)]
enum Behavior {
    /// Produce `<dir>/<file_name>` with `size_bytes` bytes
    File { file_name: String, size_bytes: u64 },
    /// Fail like a yt-dlp crash
    ToolFailure,
    /// Block until the job is cancelled
    Hang,
}

pub struct StubFetcher {
    behavior: Behavior,
    /// `None` makes every lookup fail
    formats: Option<Vec<RawFormat>>,
    calls: AtomicUsize,
    lookups: AtomicUsize,
    last_request: Mutex<Option<FetchRequest>>,
}

pub fn video_format(id: &str, height: u32, vcodec: &str, mb: u64) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        video: VideoCodec::from_ytdlp(vcodec),
        audio: None,
        height: Some(height),
        fps: Some(30.0),
        abr_kbps: None,
        filesize: Some(mb * MB_BYTES),
    }
}

pub fn audio_format(id: &str, mb: u64) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        video: None,
        audio: AudioCodec::from_ytdlp("mp4a.40.2"),
        height: None,
        fps: None,
        abr_kbps: Some(129.0),
        filesize: Some(mb * MB_BYTES),
    }
}

/// 1080p over the safe limit, 720p inside it, one audio stream
pub fn default_formats() -> Vec<RawFormat> {
    vec![
        video_format("137", 1080, "avc1.640028", 300),
        video_format("136", 720, "avc1.4d401f", 40),
        audio_format("140", 5),
    ]
}

impl StubFetcher {
    pub fn file(file_name: &str, size_bytes: u64) -> Self {
        Self::with(Behavior::File {
            file_name: file_name.to_string(),
            size_bytes,
        })
    }

    pub fn failing() -> Self {
        Self::with(Behavior::ToolFailure)
    }

    pub fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            formats: Some(default_formats()),
            calls: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_formats(mut self, formats: Vec<RawFormat>) -> Self {
        self.formats = Some(formats);
        self
    }

    pub fn lookup_fails(mut self) -> Self {
        self.formats = None;
        self
    }

    /// Downloads started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        self.last_request.lock().unwrap().clone()
    }

    /// Kind of the most recent request
    pub fn last_kind(&self) -> Option<MediaKind> {
        self.last_request().map(|r| r.kind)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    fn name(&self) -> &str {
        "stub"
    }

    async fn list_formats(&self, _url: &Url, _platform: Platform, _cancel: &CancellationToken) -> AppResult<MediaInfo> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match &self.formats {
            Some(formats) => Ok(MediaInfo {
                title: Some("Test clip".to_string()),
                formats: formats.clone(),
            }),
            None => Err(AppError::Download(DownloadError::ToolFailed {
                tool: "yt-dlp".to_string(),
                stderr: "ERROR: Private video".to_string(),
            })),
        }
    }

    async fn fetch(&self, request: &FetchRequest, dir: &Path, cancel: &CancellationToken) -> AppResult<Artifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.behavior {
            Behavior::File { file_name, size_bytes } => {
                let path = dir.join(file_name);
                // Sparse, so multi-GB artifacts cost nothing on disk
                let file = std::fs::File::create(&path)?;
                file.set_len(*size_bytes)?;
                let kind = MediaKind::from_output(request.kind, &path);
                Ok(Artifact::new(path, *size_bytes, kind))
            }
            Behavior::ToolFailure => Err(AppError::Download(DownloadError::ToolFailed {
                tool: "yt-dlp".to_string(),
                stderr: "ERROR: Unsupported URL: /internal/path".to_string(),
            })),
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(AppError::Cancelled)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourierEvent {
    Notify(String),
    Upload { transport: Transport, file_present: bool },
}

#[derive(Default)]
pub struct RecordingCourier {
    events: Mutex<Vec<CourierEvent>>,
    scripted: Mutex<VecDeque<Result<(), UploadError>>>,
}

impl RecordingCourier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload results returned in order; once exhausted every upload succeeds.
    pub fn with_upload_results(results: Vec<Result<(), UploadError>>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            scripted: Mutex::new(results.into()),
        }
    }

    pub fn events(&self) -> Vec<CourierEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Transport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CourierEvent::Upload { transport, .. } => Some(transport),
                CourierEvent::Notify(_) => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CourierEvent::Notify(text) => Some(text),
                CourierEvent::Upload { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Courier for RecordingCourier {
    async fn notify(&self, _chat_id: ChatId, text: &str) {
        self.events.lock().unwrap().push(CourierEvent::Notify(text.to_string()));
    }

    async fn upload(&self, _chat_id: ChatId, artifact: &Artifact, transport: Transport) -> Result<(), UploadError> {
        self.events.lock().unwrap().push(CourierEvent::Upload {
            transport,
            file_present: artifact.path.exists(),
        });
        self.scripted.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
