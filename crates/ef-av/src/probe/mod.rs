//! Media probing: what a produced artifact actually contains.
//!
//! The pipeline probes intermediate artifacts (to time transitions) and the
//! exported episode (to check compliance). [`Prober`] is the seam; the
//! [`FfprobeProber`] implementation shells out to ffprobe.

pub mod ffprobe;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ef_core::{AudioCodec, Container, Resolution, VideoCodec};
use serde::Serialize;

pub use self::ffprobe::{parse_ffprobe_json, FfprobeProber};

/// First video stream of a probed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStream {
    /// Recognised codec, `None` for codecs episodeforge does not produce.
    pub codec: Option<VideoCodec>,
    /// Codec name exactly as reported by the prober.
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second, if reported.
    pub frame_rate: Option<f64>,
}

impl VideoStream {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// First audio stream of a probed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioStream {
    pub codec: Option<AudioCodec>,
    pub codec_name: String,
    pub channels: u32,
    pub sample_rate: Option<u32>,
}

/// Probed properties of a media file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    /// Recognised container, `None` if the format is not one episodeforge writes.
    pub container: Option<Container>,
    /// Container format name as reported by the prober.
    pub format_name: String,
    pub duration: Option<Duration>,
    pub file_size: u64,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
}

/// Backend capable of reading media properties from a file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Probe the file at `path`.
    async fn probe(&self, path: &Path) -> ef_core::Result<MediaInfo>;
}
