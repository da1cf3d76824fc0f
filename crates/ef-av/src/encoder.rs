//! The encoder collaborator: every operation that turns input media into a
//! new video artifact.
//!
//! The pipeline only sees the [`Encoder`] trait. [`FfmpegEncoder`] implements
//! it by shelling out to ffmpeg through the functions in [`crate::actions`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ef_core::{
    AudioCodec, ColorGrade, ComplianceProfile, Container, QualityPreset, Resolution,
    TransitionSpec, VideoCodec,
};
use serde::Serialize;

use crate::actions;
use crate::probe::{FfprobeProber, Prober};
use crate::tools::ToolRegistry;

/// Everything an encode needs to know about its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeTarget {
    pub resolution: Resolution,
    pub frame_rate: f64,
    pub video_codec: VideoCodec,
    pub crf: u32,
    /// Encoder speed preset (`veryfast` .. `veryslow`).
    pub speed: String,
    pub max_bitrate: Option<String>,
    pub audio_codec: AudioCodec,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub container: Container,
}

impl EncodeTarget {
    /// Delivery target: geometry and rate control from the quality preset,
    /// container and codecs from the compliance profile.
    pub fn from_preset(preset: &QualityPreset, profile: &ComplianceProfile) -> Self {
        Self {
            resolution: preset.resolution,
            frame_rate: preset.frame_rate,
            video_codec: profile.video_codec,
            crf: preset.crf,
            speed: preset.speed.clone(),
            max_bitrate: preset.max_bitrate.clone(),
            audio_codec: profile.audio_codec,
            audio_bitrate: preset.audio_bitrate.clone(),
            sample_rate: preset.sample_rate,
            container: profile.container,
        }
    }

    /// Working-file target for intermediates between stages.
    ///
    /// Same geometry as the delivery preset so that concat and xfade see
    /// uniform inputs; fast high-quality h264 with PCM audio in Matroska.
    pub fn intermediate(preset: &QualityPreset, crf: u32) -> Self {
        Self {
            resolution: preset.resolution,
            frame_rate: preset.frame_rate,
            video_codec: VideoCodec::H264,
            crf,
            speed: "veryfast".to_string(),
            max_bitrate: None,
            audio_codec: AudioCodec::Pcm,
            audio_bitrate: preset.audio_bitrate.clone(),
            sample_rate: preset.sample_rate,
            container: Container::Mkv,
        }
    }

    /// File extension matching [`EncodeTarget::container`].
    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }
}

/// Opaque encode operations the pipeline delegates to.
///
/// Every method writes exactly one file at `output` or fails.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Mux an animation with its audio track, scaled and padded to the
    /// target resolution and frame rate.
    async fn compose_scene(
        &self,
        animation: &Path,
        audio: &Path,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;

    /// Join clips end to end with hard cuts.
    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;

    /// Join two clips with a transition overlapping the end of `first`.
    async fn transition(
        &self,
        first: &Path,
        second: &Path,
        spec: &TransitionSpec,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;

    /// Apply a colour grade.
    async fn grade(
        &self,
        input: &Path,
        grade: &ColorGrade,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;

    /// Final transcode to the delivery target.
    async fn export(
        &self,
        input: &Path,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;
}

/// ffmpeg-backed [`Encoder`].
#[derive(Clone)]
pub struct FfmpegEncoder {
    tools: Arc<ToolRegistry>,
    prober: Arc<dyn Prober>,
}

impl FfmpegEncoder {
    /// Build from discovered tools. Requires both ffmpeg and ffprobe, the
    /// latter to time transitions.
    pub fn new(tools: Arc<ToolRegistry>) -> ef_core::Result<Self> {
        tools.require("ffmpeg")?;
        let prober = Arc::new(FfprobeProber::from_registry(&tools)?);
        Self::with_prober(tools, prober)
    }

    /// Use a specific prober for clip durations.
    pub fn with_prober(
        tools: Arc<ToolRegistry>,
        prober: Arc<dyn Prober>,
    ) -> ef_core::Result<Self> {
        tools.require("ffmpeg")?;
        Ok(Self { tools, prober })
    }
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("tools", &self.tools)
            .field("prober", &self.prober.name())
            .finish()
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn compose_scene(
        &self,
        animation: &Path,
        audio: &Path,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        actions::compose_scene(&self.tools, animation, audio, output, target).await
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        actions::concat(&self.tools, inputs, output, target).await
    }

    async fn transition(
        &self,
        first: &Path,
        second: &Path,
        spec: &TransitionSpec,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        let info = self.prober.probe(first).await?;
        let first_duration = info.duration.ok_or_else(|| {
            ef_core::Error::Probe(format!("no duration reported for {}", first.display()))
        })?;
        actions::transition(
            &self.tools,
            first,
            first_duration,
            second,
            spec,
            output,
            target,
        )
        .await
    }

    async fn grade(
        &self,
        input: &Path,
        grade: &ColorGrade,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        actions::grade(&self.tools, input, grade, output, target).await
    }

    async fn export(
        &self,
        input: &Path,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        actions::export(&self.tools, input, output, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_core::PresetCatalog;

    #[test]
    fn delivery_target_takes_codecs_from_profile() {
        let catalog = PresetCatalog::builtin();
        let preset = catalog.quality("standard").unwrap();
        let profile = catalog.profile("archive").unwrap();
        let target = EncodeTarget::from_preset(preset, profile);

        assert_eq!(target.resolution, preset.resolution);
        assert_eq!(target.crf, preset.crf);
        assert_eq!(target.video_codec, profile.video_codec);
        assert_eq!(target.audio_codec, profile.audio_codec);
        assert_eq!(target.extension(), profile.container.extension());
    }

    #[test]
    fn intermediate_target_keeps_geometry() {
        let preset = PresetCatalog::builtin().quality("draft").unwrap();
        let target = EncodeTarget::intermediate(preset, 16);
        assert_eq!(target.resolution, preset.resolution);
        assert_eq!(target.frame_rate, preset.frame_rate);
        assert_eq!(target.crf, 16);
        assert_eq!(target.video_codec, VideoCodec::H264);
        assert_eq!(target.extension(), "mkv");
    }

    #[test]
    fn ffmpeg_encoder_requires_ffmpeg() {
        let err = FfmpegEncoder::new(Arc::new(ToolRegistry::default())).unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn shared_prober_still_requires_ffmpeg() {
        let tools = Arc::new(ToolRegistry::default());
        let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new("/usr/bin/ffprobe".into()));
        let err = FfmpegEncoder::with_prober(tools, prober).unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }
}
