//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (yt-dlp, ffprobe)
//! with configurable timeouts so a hung tool cannot block a job forever.
//! Children are spawned with `kill_on_drop`, so a timed out or cancelled
//! invocation does not leave the process running.

use std::io::ErrorKind;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::core::error::AppError;
use crate::download::error::DownloadError;

/// Default timeout for ffprobe metadata queries (30 seconds)
pub const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for `yt-dlp -J` format lookups (60 seconds)
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Run an async Command with a timeout, aborting early if `cancel` fires.
///
/// Returns the process Output (whatever its exit status), or
/// - `AppError::Download(ToolMissing)` if the binary cannot be spawned,
/// - `AppError::Download(Timeout)` if it ran longer than `timeout`,
/// - `AppError::Cancelled` if the job was cancelled meanwhile.
pub async fn run_with_timeout(
    cmd: &mut Command,
    tool: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Output, AppError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        let reason = if e.kind() == ErrorKind::NotFound {
            "binary not found".to_string()
        } else {
            e.to_string()
        };
        AppError::Download(DownloadError::ToolMissing {
            tool: tool.to_string(),
            reason,
        })
    })?;

    tokio::select! {
        _ = cancel.cancelled() => {
            log::info!("{} cancelled, killing process", tool);
            Err(AppError::Cancelled)
        }
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(_) => Err(AppError::Download(DownloadError::Timeout {
                tool: tool.to_string(),
                after: timeout,
            })),
        },
    }
}
