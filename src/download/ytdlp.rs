//! yt-dlp backend with an ffprobe sanity check of the result.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs_err::tokio as fs;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::config::ToolSettings;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{run_with_timeout, FFPROBE_TIMEOUT, METADATA_TIMEOUT};
use crate::delivery::formats::{AudioCodec, VideoCodec};
use crate::delivery::{Artifact, MediaKind, RawFormat};
use crate::download::error::{tail, DownloadError};
use crate::download::fetcher::{FetchRequest, Fetcher, MediaInfo};
use crate::download::platform::Platform;

/// Characters of stderr kept in `ToolFailed`
const STDERR_TAIL_CHARS: usize = 500;

/// Extensions yt-dlp leaves behind that are never the final media file
const IGNORED_EXTENSIONS: [&str; 5] = ["part", "ytdl", "json", "temp", "tmp"];

pub struct YtDlpFetcher {
    tools: ToolSettings,
}

impl YtDlpFetcher {
    pub fn new(tools: ToolSettings) -> Self {
        Self { tools }
    }

    /// Command line arguments for one request. The output template keeps
    /// every file inside `dir`.
    pub fn build_args(request: &FetchRequest, dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["--no-playlist".into(), "--no-progress".into()];
        match request.kind {
            MediaKind::Audio => {
                args.extend(["-x", "--audio-format", "mp3"].map(String::from));
            }
            MediaKind::Video | MediaKind::DocumentFallback => match &request.format {
                Some(format) => {
                    args.extend(["-f".to_string(), format.selector.clone()]);
                    args.extend(["--merge-output-format".to_string(), format.container.to_string()]);
                }
                None => {
                    args.extend(["-f", "bv*+ba/b", "--merge-output-format", "mp4"].map(String::from));
                }
            },
        }
        args.push("-o".into());
        args.push(dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned());
        args.push(request.url.to_string());
        args
    }

    /// Arguments for a metadata-only lookup. `-f best` narrows the lookup
    /// for sites whose default selector fails.
    pub fn metadata_args(url: &Url, best_only: bool) -> Vec<String> {
        let mut args: Vec<String> = vec!["-J".into(), "--no-playlist".into(), "--no-warnings".into()];
        if best_only {
            args.extend(["-f", "best"].map(String::from));
        }
        args.push(url.to_string());
        args
    }

    async fn dump_json(&self, url: &Url, best_only: bool, cancel: &CancellationToken) -> AppResult<MediaInfo> {
        let mut cmd = Command::new(&self.tools.ytdl_bin);
        cmd.args(Self::metadata_args(url, best_only));
        let output = run_with_timeout(&mut cmd, &self.tools.ytdl_bin, METADATA_TIMEOUT, cancel).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::ToolFailed {
                tool: self.tools.ytdl_bin.clone(),
                stderr: tail(&stderr, STDERR_TAIL_CHARS),
            }
            .into());
        }
        Ok(parse_media_info(&output.stdout)?)
    }

    async fn probe_streams(&self, path: &Path, cancel: &CancellationToken) -> AppResult<MediaStreams> {
        let mut cmd = Command::new(&self.tools.ffprobe_bin);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path);

        let output = run_with_timeout(&mut cmd, &self.tools.ffprobe_bin, FFPROBE_TIMEOUT, cancel).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::InvalidMedia(format!("ffprobe could not read the file: {}", tail(&stderr, 200))).into());
        }
        Ok(MediaStreams::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_formats(&self, url: &Url, platform: Platform, cancel: &CancellationToken) -> AppResult<MediaInfo> {
        log::info!("Looking up formats for {} ({})", url, platform);
        let info = match self.dump_json(url, false, cancel).await {
            Err(e) if platform.retries_with_best() && !matches!(e, AppError::Cancelled) => {
                log::warn!("Format lookup failed for {} ({}), retrying with -f best", url, e);
                self.dump_json(url, true, cancel).await?
            }
            result => result?,
        };
        log::debug!("{} formats for {}", info.formats.len(), url);
        Ok(info)
    }

    async fn fetch(&self, request: &FetchRequest, dir: &Path, cancel: &CancellationToken) -> AppResult<Artifact> {
        let args = Self::build_args(request, dir);
        log::info!("Running {} for {} ({})", self.tools.ytdl_bin, request.url, request.kind);
        log::debug!("{} args: {:?}", self.tools.ytdl_bin, args);

        let mut cmd = Command::new(&self.tools.ytdl_bin);
        cmd.args(&args);
        let output = run_with_timeout(&mut cmd, &self.tools.ytdl_bin, self.tools.timeout, cancel).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("{} exited with {}: {}", self.tools.ytdl_bin, output.status, tail(&stderr, 200));
            return Err(DownloadError::ToolFailed {
                tool: self.tools.ytdl_bin.clone(),
                stderr: tail(&stderr, STDERR_TAIL_CHARS),
            }
            .into());
        }

        let path = find_media_file(dir).await?;
        let size_bytes = fs::metadata(&path).await.map_err(DownloadError::from)?.len();
        if size_bytes == 0 {
            return Err(DownloadError::EmptyFile(format!("{} is empty", path.display())).into());
        }

        let kind = MediaKind::from_output(request.kind, &path);
        if kind != MediaKind::DocumentFallback {
            let streams = self.probe_streams(&path, cancel).await?;
            streams.check(kind)?;
        }

        log::info!("Fetched {} ({} bytes, {})", path.display(), size_bytes, kind);
        Ok(Artifact::new(path, size_bytes, kind))
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    fps: Option<f64>,
    abr: Option<f64>,
    /// Total bitrate in kbit/s
    tbr: Option<f64>,
    /// Some extractors report sizes as floats
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

fn whole_bytes(bytes: f64) -> Option<u64> {
    (bytes.is_finite() && bytes > 0.0).then_some(bytes as u64)
}

impl FormatJson {
    /// Exact size, then yt-dlp's estimate, then bitrate times duration.
    fn size_bytes(&self, duration: Option<f64>) -> Option<u64> {
        self.filesize
            .and_then(whole_bytes)
            .or_else(|| self.filesize_approx.and_then(whole_bytes))
            .or_else(|| whole_bytes(self.tbr? * 1000.0 / 8.0 * duration?))
    }

    /// A missing codec field means "unknown", while `none` means "no such stream".
    fn into_raw(self, duration: Option<f64>) -> RawFormat {
        let video = match self.vcodec.as_deref() {
            None => Some(VideoCodec::Unknown),
            Some(vcodec) => VideoCodec::from_ytdlp(vcodec),
        };
        let audio = match self.acodec.as_deref() {
            None => Some(AudioCodec::Unknown),
            Some(acodec) => AudioCodec::from_ytdlp(acodec),
        };
        RawFormat {
            filesize: self.size_bytes(duration),
            format_id: self.format_id,
            video,
            audio,
            height: self.height,
            fps: self.fps,
            abr_kbps: self.abr,
        }
    }
}

/// Parses `yt-dlp -J` output into a title and a stream list.
pub fn parse_media_info(json: &[u8]) -> Result<MediaInfo, DownloadError> {
    let info: InfoJson = serde_json::from_slice(json).map_err(|e| DownloadError::BadMetadata(e.to_string()))?;
    let duration = info.duration;
    Ok(MediaInfo {
        title: info.title.filter(|t| !t.trim().is_empty()),
        formats: info.formats.into_iter().map(|f| f.into_raw(duration)).collect(),
    })
}

/// Stream types reported by ffprobe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStreams {
    pub video: bool,
    pub audio: bool,
}

impl MediaStreams {
    /// Parses one `codec_type` per line.
    pub fn parse(output: &str) -> Self {
        output.lines().map(str::trim).fold(Self::default(), |acc, line| match line {
            "video" => Self { video: true, ..acc },
            "audio" => Self { audio: true, ..acc },
            _ => acc,
        })
    }

    /// Video needs both tracks, audio needs an audio track.
    pub fn check(&self, kind: MediaKind) -> Result<(), DownloadError> {
        match kind {
            MediaKind::Video if !(self.video && self.audio) => Err(DownloadError::InvalidMedia(format!(
                "expected video and audio streams, found video={} audio={}",
                self.video, self.audio
            ))),
            MediaKind::Audio if !self.audio => Err(DownloadError::InvalidMedia("no audio stream".to_string())),
            _ => Ok(()),
        }
    }
}

/// Picks the produced media file in `dir`, skipping yt-dlp leftovers.
///
/// If the tool left several candidates (e.g. unmerged formats), the largest wins.
pub async fn find_media_file(dir: &Path) -> Result<PathBuf, DownloadError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut candidates: Vec<(PathBuf, u64)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_file() || is_leftover(&path) {
            continue;
        }
        candidates.push((path, metadata.len()));
    }

    if candidates.len() > 1 {
        log::warn!("{} candidate files in {}, taking the largest", candidates.len(), dir.display());
    }

    candidates
        .into_iter()
        .max_by_key(|(_, len)| *len)
        .map(|(path, _)| path)
        .ok_or_else(|| DownloadError::FileNotFound(format!("no media file in {}", dir.display())))
}

fn is_leftover(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IGNORED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::Container;
    use crate::download::fetcher::FormatSelection;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn request(kind: MediaKind) -> FetchRequest {
        FetchRequest::new(url::Url::parse("https://example.com/watch?v=abc").unwrap(), kind)
    }

    #[test]
    fn test_build_args_video() {
        let args = YtDlpFetcher::build_args(&request(MediaKind::Video), Path::new("/tmp/job"));
        assert_eq!(
            args,
            vec![
                "--no-playlist",
                "--no-progress",
                "-f",
                "bv*+ba/b",
                "--merge-output-format",
                "mp4",
                "-o",
                "/tmp/job/%(id)s.%(ext)s",
                "https://example.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn test_build_args_audio() {
        let args = YtDlpFetcher::build_args(&request(MediaKind::Audio), Path::new("/tmp/job"));
        assert!(args.windows(3).any(|w| w == ["-x", "--audio-format", "mp3"]));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=abc"));
    }

    #[test]
    fn test_build_args_with_chosen_format() {
        let request = request(MediaKind::Video).with_format(FormatSelection {
            selector: "248+251".to_string(),
            container: Container::Mkv,
        });
        let args = YtDlpFetcher::build_args(&request, Path::new("/tmp/job"));
        assert!(args.windows(2).any(|w| w == ["-f", "248+251"]));
        assert!(args.windows(2).any(|w| w == ["--merge-output-format", "mkv"]));
    }

    #[test]
    fn test_metadata_args() {
        let url = url::Url::parse("https://rutube.ru/video/abc/").unwrap();
        assert_eq!(
            YtDlpFetcher::metadata_args(&url, false),
            vec!["-J", "--no-playlist", "--no-warnings", "https://rutube.ru/video/abc/"]
        );
        assert!(YtDlpFetcher::metadata_args(&url, true).windows(2).any(|w| w == ["-f", "best"]));
    }

    #[test]
    fn test_parse_media_info() {
        let json = br#"{
            "title": "Clip",
            "duration": 100.0,
            "formats": [
                {"format_id": "sb0", "vcodec": "none", "acodec": "none", "format_note": "storyboard"},
                {"format_id": "140", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "filesize": 1600000},
                {"format_id": "137", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 30, "filesize_approx": 90000000},
                {"format_id": "136", "vcodec": "avc1.4d401f", "acodec": "none", "height": 720, "fps": 30, "tbr": 800.0}
            ]
        }"#;

        let info = parse_media_info(json).unwrap();

        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.formats.len(), 4);
        assert_eq!(info.formats[0].video, None);
        assert_eq!(info.formats[0].audio, None);
        assert_eq!(info.formats[1].audio, Some(AudioCodec::Aac));
        assert_eq!(info.formats[2].filesize, Some(90_000_000));
        assert_eq!(info.formats[2].video, Some(VideoCodec::H264));
        // 800 kbit/s for 100 s
        assert_eq!(info.formats[3].filesize, Some(10_000_000));
    }

    #[test]
    fn test_parse_media_info_rejects_garbage() {
        let err = parse_media_info(b"ERROR: not json").unwrap_err();
        assert!(matches!(err, DownloadError::BadMetadata(_)));
    }

    #[test]
    fn test_media_streams() {
        let both = MediaStreams::parse("video\naudio\n");
        assert!(both.check(MediaKind::Video).is_ok());
        assert!(both.check(MediaKind::Audio).is_ok());

        let silent = MediaStreams::parse("video\n");
        assert!(matches!(silent.check(MediaKind::Video), Err(DownloadError::InvalidMedia(_))));
        assert!(silent.check(MediaKind::Audio).is_err());
        assert!(silent.check(MediaKind::DocumentFallback).is_ok());

        let audio = MediaStreams::parse("audio\n");
        assert!(audio.check(MediaKind::Audio).is_ok());
    }

    #[tokio::test]
    async fn test_find_media_file_skips_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp4.part"), vec![0u8; 4096]).unwrap();
        std::fs::write(dir.path().join("abc.info.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("abc.mp4"), b"media").unwrap();

        let found = find_media_file(dir.path()).await.unwrap();
        assert_eq!(found, dir.path().join("abc.mp4"));
    }

    #[tokio::test]
    async fn test_find_media_file_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.webm.ytdl"), b"state").unwrap();

        let err = find_media_file(dir.path()).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileNotFound(_)));
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    fn tools(ytdl_bin: String, ffprobe_bin: String) -> ToolSettings {
        ToolSettings {
            ytdl_bin,
            ffprobe_bin,
            timeout: Duration::from_secs(10),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_with_fake_tools() {
        let bin = tempfile::tempdir().unwrap();
        let job = tempfile::tempdir().unwrap();
        let ytdl = fake_tool(
            bin.path(),
            "yt-dlp",
            &format!("printf 'media' > '{}/abc.mp4'", job.path().display()),
        );
        let ffprobe = fake_tool(bin.path(), "ffprobe", "printf 'video\\naudio\\n'");
        let fetcher = YtDlpFetcher::new(tools(ytdl, ffprobe));

        let artifact = fetcher
            .fetch(&request(MediaKind::Video), job.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.path, job.path().join("abc.mp4"));
        assert_eq!(artifact.size_bytes, 5);
        assert_eq!(artifact.kind, MediaKind::Video);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_non_mp4_becomes_document_fallback() {
        let bin = tempfile::tempdir().unwrap();
        let job = tempfile::tempdir().unwrap();
        let ytdl = fake_tool(
            bin.path(),
            "yt-dlp",
            &format!("printf 'media' > '{}/abc.webm'", job.path().display()),
        );
        // ffprobe is not consulted for document fallbacks
        let fetcher = YtDlpFetcher::new(tools(ytdl, "definitely-not-ffprobe-4242".to_string()));

        let artifact = fetcher
            .fetch(&request(MediaKind::Video), job.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.kind, MediaKind::DocumentFallback);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_tool_failure_keeps_stderr_tail() {
        let bin = tempfile::tempdir().unwrap();
        let job = tempfile::tempdir().unwrap();
        let ytdl = fake_tool(bin.path(), "yt-dlp", "echo 'ERROR: Unsupported URL' >&2; exit 1");
        let fetcher = YtDlpFetcher::new(tools(ytdl, "ffprobe".to_string()));

        let err = fetcher
            .fetch(&request(MediaKind::Video), job.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            crate::core::error::AppError::Download(DownloadError::ToolFailed { stderr, .. }) => {
                assert_eq!(stderr, "ERROR: Unsupported URL");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_formats_retries_rutube_with_best() {
        let bin = tempfile::tempdir().unwrap();
        // Fails unless called with `-f best`
        let ytdl = fake_tool(
            bin.path(),
            "yt-dlp",
            r#"case "$*" in *"-f best"*) printf '{"title":"T","formats":[]}' ;; *) echo 'ERROR: no formats' >&2; exit 1 ;; esac"#,
        );
        let fetcher = YtDlpFetcher::new(tools(ytdl, "ffprobe".to_string()));

        let rutube = url::Url::parse("https://rutube.ru/video/abc/").unwrap();
        let info = fetcher
            .list_formats(&rutube, Platform::RuTube, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.title.as_deref(), Some("T"));

        let youtube = url::Url::parse("https://youtu.be/abc").unwrap();
        let err = fetcher
            .list_formats(&youtube, Platform::YouTube, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::AppError::Download(DownloadError::ToolFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_empty_file() {
        let bin = tempfile::tempdir().unwrap();
        let job = tempfile::tempdir().unwrap();
        let ytdl = fake_tool(bin.path(), "yt-dlp", &format!(": > '{}/abc.mp3'", job.path().display()));
        let fetcher = YtDlpFetcher::new(tools(ytdl, "ffprobe".to_string()));

        let err = fetcher
            .fetch(&request(MediaKind::Audio), job.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::core::error::AppError::Download(DownloadError::EmptyFile(_))
        ));
    }
}
