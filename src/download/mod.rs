//! Download management and processing

pub mod courier;
pub mod error;
pub mod fetcher;
pub mod jobs;
pub mod pipeline;
pub mod platform;
pub mod temp_storage;
pub mod ytdlp;

// Re-exports for convenience
pub use courier::{Courier, UploadError};
pub use error::DownloadError;
pub use fetcher::{FetchRequest, Fetcher, FormatSelection, MediaInfo};
pub use jobs::{AdmissionError, JobHandle, JobRegistry};
pub use pipeline::{run_job, Job, JobContext, JobOutcome, UploadRetry};
pub use platform::Platform;
pub use temp_storage::TempStorage;
pub use ytdlp::YtDlpFetcher;
