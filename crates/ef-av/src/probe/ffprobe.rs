//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`MediaInfo`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ef_core::{AudioCodec, Container, VideoCodec};
use serde::Deserialize;

use super::{AudioStream, MediaInfo, Prober, VideoStream};
use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Probing a single file should never take long.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober from the discovered tools.
    pub fn from_registry(tools: &ToolRegistry) -> ef_core::Result<Self> {
        Ok(Self::new(tools.require("ffprobe")?.path.clone()))
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> ef_core::Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(PROBE_TIMEOUT);
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await?;
        parse_ffprobe_json(path, &output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse ffprobe's JSON report for the file at `path`.
///
/// Only the first video and first audio stream are kept.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> ef_core::Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ef_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64);

    let file_size = output
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let format_name = output.format.format_name.unwrap_or_default();
    let container = map_container(&format_name, path);

    let mut video = None;
    let mut audio = None;

    for stream in output.streams {
        let codec_name = stream.codec_name.unwrap_or_default();
        match stream.codec_type.as_deref() {
            Some("video") if video.is_none() => {
                // Cover art shows up as a zero-rate video stream.
                let frame_rate = stream
                    .avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));
                video = Some(VideoStream {
                    codec: codec_name.parse::<VideoCodec>().ok(),
                    codec_name,
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate,
                });
            }
            Some("audio") if audio.is_none() => {
                audio = Some(AudioStream {
                    codec: map_audio_codec(&codec_name),
                    codec_name,
                    channels: stream.channels.unwrap_or(2),
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                });
            }
            _ => {}
        }
    }

    Ok(MediaInfo {
        path: path.to_path_buf(),
        container,
        format_name,
        duration,
        file_size,
        video,
        audio,
    })
}

/// Parse `num/den` or a plain number. A zero rate means "unknown".
fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let rate = match rate_str.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate_str.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

/// ffprobe reports the demuxer family, which is shared between mp4 and mov
/// (and between matroska and webm); the extension decides within a family.
fn map_container(format_name: &str, path: &Path) -> Option<Container> {
    let lower = format_name.to_lowercase();
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| Container::from_extension(&e.to_lowercase()));

    if lower.contains("matroska") || lower.contains("webm") {
        match by_ext {
            Some(c @ (Container::Mkv | Container::Webm)) => Some(c),
            _ => Some(Container::Mkv),
        }
    } else if lower.contains("mp4") || lower.contains("mov") {
        match by_ext {
            Some(c @ (Container::Mp4 | Container::Mov)) => Some(c),
            _ => Some(Container::Mp4),
        }
    } else {
        None
    }
}

fn map_audio_codec(codec_name: &str) -> Option<AudioCodec> {
    match codec_name {
        "aac" => Some(AudioCodec::Aac),
        "opus" => Some(AudioCodec::Opus),
        "mp3" => Some(AudioCodec::Mp3),
        "flac" => Some(AudioCodec::Flac),
        name if name.starts_with("pcm_") => Some(AudioCodec::Pcm),
        _ => None,
    }
}
