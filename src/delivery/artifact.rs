//! Produced media files as handed over by the download toolchain.

use std::path::{Path, PathBuf};

use strum::{Display, EnumString};

/// What kind of upload an artifact is suited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MediaKind {
    Video,
    Audio,
    /// Output that Telegram cannot play inline (e.g. an mkv/webm that could
    /// not be remuxed to mp4); only ever sent as a plain file.
    #[strum(to_string = "document", serialize = "document_fallback")]
    DocumentFallback,
}

impl MediaKind {
    /// Derives the kind of a produced file from what was requested and the
    /// container the toolchain actually wrote.
    ///
    /// Only containers Telegram renders inline keep their media kind.
    pub fn from_output(requested: MediaKind, path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match (requested, ext.as_str()) {
            (MediaKind::Video, "mp4") => MediaKind::Video,
            (MediaKind::Audio, "mp3" | "m4a") => MediaKind::Audio,
            _ => MediaKind::DocumentFallback,
        }
    }
}

/// A media file ready for delivery.
///
/// The policy only reads `size_bytes` and `kind`; the file itself belongs to
/// the job that produced it and is removed with the job's temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: MediaKind,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            kind,
        }
    }

    /// File name used for the upload, falling back to a generic one.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| "media".to_string())
    }
}
