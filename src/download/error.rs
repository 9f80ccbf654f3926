use std::fmt;
use std::time::Duration;

/// Structured error type for the external download toolchain.
#[derive(Debug)]
pub enum DownloadError {
    /// Binary could not be spawned (not installed, not on PATH)
    ToolMissing { tool: String, reason: String },
    /// Tool exited with a non-zero status
    ToolFailed { tool: String, stderr: String },
    /// Tool did not finish in time and was killed
    Timeout { tool: String, after: Duration },
    /// Tool succeeded but no media file was produced
    FileNotFound(String),
    /// Produced file has zero bytes
    EmptyFile(String),
    /// ffprobe did not find the expected streams
    InvalidMedia(String),
    /// `yt-dlp -J` output could not be read as a format list
    BadMetadata(String),
    /// Filesystem failure inside the job directory
    Io(std::io::Error),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::ToolMissing { tool, reason } => write!(f, "{} could not be started: {}", tool, reason),
            DownloadError::ToolFailed { tool, stderr } => write!(f, "{} failed: {}", tool, stderr),
            DownloadError::Timeout { tool, after } => write!(f, "{} timed out after {}s", tool, after.as_secs()),
            DownloadError::FileNotFound(msg) => write!(f, "{}", msg),
            DownloadError::EmptyFile(msg) => write!(f, "{}", msg),
            DownloadError::InvalidMedia(msg) => write!(f, "{}", msg),
            DownloadError::BadMetadata(msg) => write!(f, "unreadable format list: {}", msg),
            DownloadError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DownloadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Io(e)
    }
}

impl DownloadError {
    /// Short stable tag for log lines
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::ToolMissing { .. } => "tool_missing",
            DownloadError::ToolFailed { .. } => "tool_failed",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::EmptyFile(_) => "empty_file",
            DownloadError::InvalidMedia(_) => "invalid_media",
            DownloadError::BadMetadata(_) => "bad_metadata",
            DownloadError::Io(_) => "io",
        }
    }

    /// Text shown to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadError::ToolMissing { .. } | DownloadError::Io(_) => {
                "⛔ The downloader is temporarily unavailable. Please try again later."
            }
            DownloadError::ToolFailed { .. } => "⛔ Could not fetch media from this link. It may be private or unsupported.",
            DownloadError::Timeout { .. } => "⛔ The download took too long and was stopped. Try a shorter video.",
            DownloadError::FileNotFound(_) | DownloadError::EmptyFile(_) => {
                "⛔ The download produced no file. Try another link or format."
            }
            DownloadError::InvalidMedia(_) => "⛔ The downloaded file is broken (missing video or audio).",
            DownloadError::BadMetadata(_) => "⛔ Could not read the list of formats for this link.",
        }
    }
}

/// Keeps the last `max_chars` characters of tool output for logs and errors.
pub fn tail(output: &str, max_chars: usize) -> String {
    let trimmed = output.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_display() {
        let err = DownloadError::ToolFailed {
            tool: "yt-dlp".into(),
            stderr: "ERROR: Unsupported URL".into(),
        };
        assert_eq!(err.to_string(), "yt-dlp failed: ERROR: Unsupported URL");

        let err = DownloadError::Timeout {
            tool: "yt-dlp".into(),
            after: Duration::from_secs(900),
        };
        assert_eq!(err.to_string(), "yt-dlp timed out after 900s");
    }

    #[test]
    fn test_download_error_category() {
        assert_eq!(DownloadError::FileNotFound("".into()).category(), "file_not_found");
        assert_eq!(DownloadError::EmptyFile("".into()).category(), "empty_file");
        assert_eq!(DownloadError::InvalidMedia("".into()).category(), "invalid_media");
        assert_eq!(DownloadError::BadMetadata("".into()).category(), "bad_metadata");
    }

    #[test]
    fn test_tail_keeps_end_of_output() {
        assert_eq!(tail("  short  ", 10), "short");
        assert_eq!(tail("0123456789abcdef", 6), "abcdef");
    }
}
