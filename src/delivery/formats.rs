//! Quality choices offered before a download.
//!
//! Every choice is one final file (a video stream merged with an audio
//! stream) labelled with the tier its estimated size falls into. Choices
//! above the hard limit are never offered.

use std::cmp::Reverse;
use std::collections::HashMap;

use strum::Display;
use thiserror::Error;

use super::policy::{classify, format_mb, SizePolicy, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
    Unknown,
}

impl VideoCodec {
    /// Maps a yt-dlp `vcodec` string (`avc1.640028`, `vp09.00.40.08`, ...).
    /// `none` means the format has no video.
    pub fn from_ytdlp(vcodec: &str) -> Option<Self> {
        let v = vcodec.trim().to_ascii_lowercase();
        if v.is_empty() || v == "none" {
            return None;
        }
        let codec = if v.starts_with("avc") || v.starts_with("h264") {
            VideoCodec::H264
        } else if v.starts_with("hev") || v.starts_with("hvc") || v.starts_with("h265") {
            VideoCodec::H265
        } else if v.starts_with("vp09") || v.starts_with("vp9") {
            VideoCodec::Vp9
        } else if v.starts_with("av01") || v.starts_with("av1") {
            VideoCodec::Av1
        } else {
            VideoCodec::Unknown
        };
        Some(codec)
    }

    fn rank(self) -> u8 {
        match self {
            VideoCodec::H264 => 0,
            VideoCodec::H265 => 1,
            VideoCodec::Vp9 => 2,
            VideoCodec::Av1 => 3,
            VideoCodec::Unknown => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
    Vorbis,
    Mp3,
    Unknown,
}

impl AudioCodec {
    /// Maps a yt-dlp `acodec` string (`mp4a.40.2`, `opus`, ...).
    pub fn from_ytdlp(acodec: &str) -> Option<Self> {
        let a = acodec.trim().to_ascii_lowercase();
        if a.is_empty() || a == "none" {
            return None;
        }
        let codec = if a.starts_with("mp4a") || a.starts_with("aac") {
            AudioCodec::Aac
        } else if a.starts_with("opus") {
            AudioCodec::Opus
        } else if a.starts_with("vorbis") {
            AudioCodec::Vorbis
        } else if a.starts_with("mp3") {
            AudioCodec::Mp3
        } else {
            AudioCodec::Unknown
        };
        Some(codec)
    }
}

/// Container the chosen streams are merged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Container {
    Mp4,
    Mkv,
}

impl Container {
    /// mp4 only holds H.264/H.265 with AAC/MP3 reliably; anything else goes to mkv.
    pub fn for_streams(video: VideoCodec, audio: Option<AudioCodec>) -> Self {
        let video_needs_mkv = matches!(video, VideoCodec::Vp9 | VideoCodec::Av1);
        let audio_needs_mkv = matches!(audio, Some(AudioCodec::Opus | AudioCodec::Vorbis));
        if video_needs_mkv || audio_needs_mkv {
            Container::Mkv
        } else {
            Container::Mp4
        }
    }
}

/// One entry of the extractor's format list.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFormat {
    pub format_id: String,
    /// `None` for audio-only formats
    pub video: Option<VideoCodec>,
    /// `None` for video-only formats
    pub audio: Option<AudioCodec>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub abr_kbps: Option<f64>,
    pub filesize: Option<u64>,
}

impl RawFormat {
    fn fps_int(&self) -> u32 {
        match self.fps {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps.round() as u32,
            _ => 0,
        }
    }
}

/// A selectable quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    /// Stable and short enough for callback data, e.g. `1080p30-h264-mp4`
    pub id: String,
    pub height: u32,
    pub fps: u32,
    pub vcodec: VideoCodec,
    pub container: Container,
    pub estimated_bytes: Option<u64>,
    /// Expected tier; never `Rejected` for an offered choice
    pub tier: Tier,
    /// yt-dlp `-f` selector, `<video>+<audio>` or a single muxed id
    pub selector: String,
}

impl FormatChoice {
    /// Button text, e.g. `✅ 720p · ~38.5 MB` or `⚠️ 2160p60`.
    pub fn label(&self) -> String {
        let mut label = format!("{} {}p", self.tier.marker(), self.height);
        if self.fps >= 50 {
            label.push_str(&self.fps.to_string());
        }
        if let Some(bytes) = self.estimated_bytes {
            label.push_str(&format!(" · ~{}", format_mb(bytes)));
        }
        label
    }

    fn rank(&self) -> (Tier, u8, u8, Reverse<u32>, u64) {
        (
            self.tier,
            (self.container != Container::Mp4) as u8,
            self.vcodec.rank(),
            Reverse(self.fps),
            self.estimated_bytes.unwrap_or(u64::MAX),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("no format with both video and audio")]
    NoUsableFormats,
}

/// Size of the merged file plus ~1% muxing overhead.
fn estimate(video: &RawFormat, audio: Option<&RawFormat>) -> Option<u64> {
    let total = match audio {
        Some(audio) => video.filesize?.checked_add(audio.filesize?)?,
        None => video.filesize?,
    };
    Some(total.saturating_add(total / 100))
}

/// 4K, 60 fps, mkv and VP9/AV1 are what most often fails inside Telegram.
fn risk_boost(height: u32, fps: u32, vcodec: VideoCodec, container: Container) -> u8 {
    let mut boost = 0;
    if height >= 2160 {
        boost += 2;
    }
    if fps >= 60 {
        boost += 2;
    }
    if container == Container::Mkv {
        boost += 1;
    }
    if matches!(vcodec, VideoCodec::Vp9 | VideoCodec::Av1) {
        boost += 1;
    }
    boost
}

/// Expected tier of a choice.
///
/// An unknown size cannot be promised, so it is best-effort at most. A
/// heavily risky stream (boost of 3 or more) inside the safe size is demoted
/// to best-effort as well.
pub fn expected_tier(estimated_bytes: Option<u64>, policy: &SizePolicy, risk_boost: u8) -> Tier {
    match estimated_bytes {
        None => Tier::BestEffort,
        Some(bytes) => match classify(bytes, policy) {
            Tier::Safe if risk_boost >= 3 => Tier::BestEffort,
            tier => tier,
        },
    }
}

fn choice(video: &RawFormat, audio: Option<&RawFormat>, policy: &SizePolicy) -> Option<FormatChoice> {
    let height = video.height.filter(|h| *h > 0)?;
    let vcodec = video.video?;
    let fps = video.fps_int();
    let acodec = audio.and_then(|a| a.audio).or(video.audio);
    let container = Container::for_streams(vcodec, acodec);
    let estimated_bytes = estimate(video, audio);
    let tier = expected_tier(estimated_bytes, policy, risk_boost(height, fps, vcodec, container));
    let selector = match audio {
        Some(audio) => format!("{}+{}", video.format_id, audio.format_id),
        None => video.format_id.clone(),
    };

    Some(FormatChoice {
        id: format!("{}p{}-{}-{}", height, fps, vcodec, container),
        height,
        fps,
        vcodec,
        container,
        estimated_bytes,
        tier,
        selector,
    })
}

/// Builds the choices offered for a link, best first per height, highest
/// resolution first.
///
/// Video-only streams are paired with the best audio-only stream. When the
/// extractor has no such pair (common for progressive-only sites), muxed
/// formats are offered instead.
///
/// # Returns
/// * `Ok(choices)` - possibly empty when every choice is over the hard limit
/// * `Err(FormatError::NoUsableFormats)` - nothing downloadable with sound
pub fn build_format_choices(formats: &[RawFormat], policy: &SizePolicy) -> Result<Vec<FormatChoice>, FormatError> {
    let video_only: Vec<&RawFormat> = formats.iter().filter(|f| f.video.is_some() && f.audio.is_none()).collect();
    let audio_only: Vec<&RawFormat> = formats.iter().filter(|f| f.audio.is_some() && f.video.is_none()).collect();
    let muxed: Vec<&RawFormat> = formats.iter().filter(|f| f.video.is_some() && f.audio.is_some()).collect();

    let best_audio = audio_only.iter().copied().max_by(|a, b| {
        let key = |f: &RawFormat| (f.abr_kbps.unwrap_or(0.0), f.filesize.unwrap_or(0));
        key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
    });

    let built: Vec<FormatChoice> = match best_audio {
        Some(audio) if !video_only.is_empty() => {
            video_only.iter().filter_map(|v| choice(v, Some(audio), policy)).collect()
        }
        _ => muxed.iter().filter_map(|m| choice(m, None, policy)).collect(),
    };

    if built.is_empty() {
        return Err(FormatError::NoUsableFormats);
    }
    Ok(deduplicate(built))
}

/// One choice per height (the best-ranked one), rejected ones dropped.
fn deduplicate(choices: Vec<FormatChoice>) -> Vec<FormatChoice> {
    let mut best_by_height: HashMap<u32, FormatChoice> = HashMap::new();
    for candidate in choices {
        match best_by_height.get(&candidate.height) {
            Some(current) if current.rank() <= candidate.rank() => {}
            _ => {
                best_by_height.insert(candidate.height, candidate);
            }
        }
    }

    let mut offered: Vec<FormatChoice> = best_by_height
        .into_values()
        .filter(|c| c.tier != Tier::Rejected)
        .collect();
    offered.sort_by_key(|c| Reverse(c.height));
    offered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::MB_BYTES;
    use pretty_assertions::assert_eq;

    fn policy() -> SizePolicy {
        SizePolicy::new(50, 2000).unwrap()
    }

    fn video(id: &str, height: u32, fps: f64, vcodec: &str, mb: Option<u64>) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            video: VideoCodec::from_ytdlp(vcodec),
            audio: None,
            height: Some(height),
            fps: Some(fps),
            abr_kbps: None,
            filesize: mb.map(|mb| mb * MB_BYTES),
        }
    }

    fn audio(id: &str, acodec: &str, abr: f64, mb: u64) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            video: None,
            audio: AudioCodec::from_ytdlp(acodec),
            height: None,
            fps: None,
            abr_kbps: Some(abr),
            filesize: Some(mb * MB_BYTES),
        }
    }

    #[test]
    fn test_codec_parsing() {
        assert_eq!(VideoCodec::from_ytdlp("avc1.640028"), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::from_ytdlp("vp09.00.40.08"), Some(VideoCodec::Vp9));
        assert_eq!(VideoCodec::from_ytdlp("av01.0.08M.08"), Some(VideoCodec::Av1));
        assert_eq!(VideoCodec::from_ytdlp("none"), None);
        assert_eq!(AudioCodec::from_ytdlp("mp4a.40.2"), Some(AudioCodec::Aac));
        assert_eq!(AudioCodec::from_ytdlp("opus"), Some(AudioCodec::Opus));
        assert_eq!(AudioCodec::from_ytdlp(""), None);
    }

    #[test]
    fn test_container_choice() {
        assert_eq!(Container::for_streams(VideoCodec::H264, Some(AudioCodec::Aac)), Container::Mp4);
        assert_eq!(Container::for_streams(VideoCodec::Vp9, Some(AudioCodec::Aac)), Container::Mkv);
        assert_eq!(Container::for_streams(VideoCodec::H264, Some(AudioCodec::Opus)), Container::Mkv);
    }

    #[test]
    fn test_choices_are_labelled_by_estimated_tier() {
        let formats = vec![
            video("137", 1080, 30.0, "avc1.640028", Some(300)),
            video("136", 720, 30.0, "avc1.4d401f", Some(40)),
            audio("140", "mp4a.40.2", 129.0, 5),
        ];

        let choices = build_format_choices(&formats, &policy()).unwrap();

        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].height, 1080);
        assert_eq!(choices[0].tier, Tier::BestEffort);
        assert_eq!(choices[0].selector, "137+140");
        assert_eq!(choices[1].height, 720);
        assert_eq!(choices[1].tier, Tier::Safe);
        assert_eq!(choices[1].container, Container::Mp4);
        assert!(choices[1].label().starts_with("✅ 720p"));
        assert!(choices[0].label().starts_with("⚠️ 1080p"));
    }

    #[test]
    fn test_choices_over_hard_limit_are_hidden() {
        let formats = vec![
            video("401", 2160, 30.0, "av01.0.12M.08", Some(2500)),
            video("136", 720, 30.0, "avc1.4d401f", Some(40)),
            audio("140", "mp4a.40.2", 129.0, 5),
        ];

        let choices = build_format_choices(&formats, &policy()).unwrap();

        assert_eq!(choices.iter().map(|c| c.height).collect::<Vec<_>>(), vec![720]);
    }

    #[test]
    fn test_all_rejected_is_an_empty_offer() {
        let formats = vec![
            video("401", 2160, 30.0, "avc1", Some(2500)),
            audio("140", "mp4a.40.2", 129.0, 5),
        ];
        assert_eq!(build_format_choices(&formats, &policy()), Ok(vec![]));
    }

    #[test]
    fn test_one_choice_per_height_prefers_mp4_h264() {
        let formats = vec![
            video("248", 1080, 30.0, "vp09.00.40.08", Some(20)),
            video("137", 1080, 30.0, "avc1.640028", Some(25)),
            audio("140", "mp4a.40.2", 129.0, 5),
        ];

        let choices = build_format_choices(&formats, &policy()).unwrap();

        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].selector, "137+140");
        assert_eq!(choices[0].id, "1080p30-h264-mp4");
    }

    #[test]
    fn test_unknown_size_is_best_effort() {
        let formats = vec![video("22", 720, 30.0, "avc1", None), audio("140", "mp4a.40.2", 129.0, 5)];
        let choices = build_format_choices(&formats, &policy()).unwrap();
        assert_eq!(choices[0].tier, Tier::BestEffort);
        assert_eq!(choices[0].estimated_bytes, None);
    }

    #[test]
    fn test_risky_stream_in_safe_size_is_demoted() {
        // 4K60 is risky even when small
        assert_eq!(expected_tier(Some(10 * MB_BYTES), &policy(), 4), Tier::BestEffort);
        assert_eq!(expected_tier(Some(10 * MB_BYTES), &policy(), 1), Tier::Safe);
        assert_eq!(expected_tier(Some(2001 * MB_BYTES), &policy(), 0), Tier::Rejected);
    }

    #[test]
    fn test_muxed_formats_without_pairs() {
        let formats = vec![RawFormat {
            format_id: "hls-720".to_string(),
            video: Some(VideoCodec::H264),
            audio: Some(AudioCodec::Aac),
            height: Some(720),
            fps: Some(25.0),
            abr_kbps: None,
            filesize: Some(30 * MB_BYTES),
        }];

        let choices = build_format_choices(&formats, &policy()).unwrap();

        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].selector, "hls-720");
        assert_eq!(choices[0].tier, Tier::Safe);
    }

    #[test]
    fn test_no_usable_formats() {
        let formats = vec![audio("140", "mp4a.40.2", 129.0, 5)];
        assert_eq!(build_format_choices(&formats, &policy()), Err(FormatError::NoUsableFormats));
    }

    #[test]
    fn test_estimate_adds_muxing_overhead() {
        let v = video("137", 1080, 30.0, "avc1", Some(100));
        let a = audio("140", "mp4a.40.2", 129.0, 0);
        assert_eq!(estimate(&v, Some(&a)), Some(100 * MB_BYTES + MB_BYTES));
    }
}
