//! Download backend abstraction.
//!
//! A [`Fetcher`] turns a link into a single media file inside a job
//! directory. The pipeline owns the directory; the fetcher only writes to it.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::error::AppResult;
use crate::delivery::{Artifact, Container, FormatChoice, MediaKind, RawFormat};
use crate::download::platform::Platform;

/// A quality the user picked from the format keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// yt-dlp `-f` selector
    pub selector: String,
    pub container: Container,
}

impl From<&FormatChoice> for FormatSelection {
    fn from(choice: &FormatChoice) -> Self {
        Self {
            selector: choice.selector.clone(),
            container: choice.container,
        }
    }
}

/// Request parameters for a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Validated http(s) link
    pub url: Url,
    /// What the user asked for; the artifact may end up as a document fallback
    pub kind: MediaKind,
    /// Exact streams to fetch; the backend picks when `None`
    pub format: Option<FormatSelection>,
}

impl FetchRequest {
    pub fn new(url: Url, kind: MediaKind) -> Self {
        Self { url, kind, format: None }
    }

    pub fn with_format(mut self, format: FormatSelection) -> Self {
        self.format = Some(format);
        self
    }
}

/// Title and stream list of a link, as reported before downloading.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub formats: Vec<RawFormat>,
}

/// Trait for download backends.
///
/// Errors are `AppError::Download` for toolchain failures and
/// `AppError::Cancelled` when `cancel` fired mid-download.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable name of this backend (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Lists the streams available for `url` without downloading anything.
    async fn list_formats(&self, url: &Url, platform: Platform, cancel: &CancellationToken) -> AppResult<MediaInfo>;

    /// Downloads the media into `dir` and describes the produced file.
    async fn fetch(&self, request: &FetchRequest, dir: &Path, cancel: &CancellationToken) -> AppResult<Artifact>;
}
