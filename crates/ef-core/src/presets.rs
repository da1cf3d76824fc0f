//! Read-only lookup tables: quality presets, compliance profiles, the
//! transition registry and colour grades.
//!
//! The built-in tables are constructed once per process and never mutated.
//! A [`PresetCatalog`] is built from them (plus user overrides from
//! [`Config`](crate::config::Config)) at start-up and shared behind an `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::media::{AudioCodec, Container, Resolution, VideoCodec};
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// QualityPreset
// ---------------------------------------------------------------------------

/// Encoding parameters for the exported episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub resolution: Resolution,
    pub frame_rate: f64,
    pub video_codec: VideoCodec,
    /// Constant rate factor passed to the encoder.
    pub crf: u32,
    /// Encoder speed preset (`veryfast`, `medium`, `slow`, ...).
    pub speed: String,
    /// Optional peak video bitrate, e.g. `"8M"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<String>,
    pub audio_codec: AudioCodec,
    pub audio_bitrate: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
    48_000
}

impl QualityPreset {
    fn builtin(
        resolution: Resolution,
        crf: u32,
        speed: &str,
        max_bitrate: Option<&str>,
        audio_bitrate: &str,
    ) -> Self {
        Self {
            resolution,
            frame_rate: 30.0,
            video_codec: VideoCodec::H264,
            crf,
            speed: speed.into(),
            max_bitrate: max_bitrate.map(Into::into),
            audio_codec: AudioCodec::Aac,
            audio_bitrate: audio_bitrate.into(),
            sample_rate: default_sample_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// ComplianceProfile
// ---------------------------------------------------------------------------

/// Container/codec/resolution/duration constraints a platform imposes on an
/// uploaded episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceProfile {
    pub container: Container,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    /// Accepted frame sizes. Empty means any.
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
    /// Accepted frame rates. Empty means any.
    #[serde(default)]
    pub frame_rates: Vec<f64>,
    /// Required display aspect ratio such as `"16:9"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    pub max_duration_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_bytes: Option<u64>,
}

impl ComplianceProfile {
    /// The required aspect ratio as a number, if one is configured and valid.
    pub fn aspect_ratio_value(&self) -> Option<f64> {
        self.aspect_ratio.as_deref().and_then(parse_aspect_ratio)
    }
}

/// Parse `"16:9"` or `"1.777"` into a width/height ratio.
pub fn parse_aspect_ratio(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(' ', "");
    if let Some((left, right)) = normalized.split_once(':') {
        let w = left.parse::<f64>().ok()?;
        let h = right.parse::<f64>().ok()?;
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        return Some(w / h);
    }
    normalized.parse::<f64>().ok().filter(|r| *r > 0.0)
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Visual transition shapes understood by the encoder collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    SlideLeft,
    SlideRight,
    FadeBlack,
    FadeWhite,
    CircleOpen,
}

impl TransitionKind {
    /// Name of the matching ffmpeg `xfade` transition.
    pub fn xfade_name(&self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Dissolve => "dissolve",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
            Self::FadeBlack => "fadeblack",
            Self::FadeWhite => "fadewhite",
            Self::CircleOpen => "circleopen",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xfade_name())
    }
}

/// A registered transition: its shape and how long it overlaps two scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration_secs: f64,
}

/// Registry name that forces a hard cut between two scenes.
pub const CUT: &str = "cut";

// ---------------------------------------------------------------------------
// ColorGrade
// ---------------------------------------------------------------------------

/// Colour-grading parameters applied to the assembled episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorGrade {
    /// -1.0 ..= 1.0, 0.0 is neutral.
    #[serde(default)]
    pub brightness: f32,
    /// 0.0 ..= 2.0, 1.0 is neutral.
    #[serde(default = "one")]
    pub contrast: f32,
    /// 0.0 ..= 3.0, 1.0 is neutral.
    #[serde(default = "one")]
    pub saturation: f32,
    /// 0.1 ..= 10.0, 1.0 is neutral.
    #[serde(default = "one")]
    pub gamma: f32,
    #[serde(default)]
    pub vignette: bool,
}

fn one() -> f32 {
    1.0
}

impl ColorGrade {
    const fn new(brightness: f32, contrast: f32, saturation: f32, gamma: f32, vignette: bool) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
            gamma,
            vignette,
        }
    }

    /// Check every parameter is inside the range the encoder accepts.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("brightness", self.brightness, -1.0, 1.0),
            ("contrast", self.contrast, 0.0, 2.0),
            ("saturation", self.saturation, 0.0, 3.0),
            ("gamma", self.gamma, 0.1, 10.0),
        ];
        for (name, value, lo, hi) in checks {
            if !(lo..=hi).contains(&value) {
                return Err(Error::Validation(format!(
                    "grade {name} {value} outside {lo}..={hi}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in tables
// ---------------------------------------------------------------------------

static BUILTIN: LazyLock<PresetCatalog> = LazyLock::new(|| {
    let quality_presets = BTreeMap::from([
        (
            "draft".to_string(),
            QualityPreset::builtin(Resolution::HD, 28, "veryfast", None, "128k"),
        ),
        (
            "standard".to_string(),
            QualityPreset::builtin(Resolution::FULL_HD, 23, "medium", Some("8M"), "192k"),
        ),
        (
            "high".to_string(),
            QualityPreset::builtin(Resolution::FULL_HD, 18, "slow", Some("12M"), "256k"),
        ),
        (
            "uhd".to_string(),
            QualityPreset::builtin(Resolution::UHD, 20, "slow", Some("45M"), "320k"),
        ),
    ]);

    let broadcast_rates = vec![24.0, 25.0, 30.0, 50.0, 60.0];
    let compliance_profiles = BTreeMap::from([
        (
            "youtube".to_string(),
            ComplianceProfile {
                container: Container::Mp4,
                video_codec: VideoCodec::H264,
                audio_codec: AudioCodec::Aac,
                resolutions: vec![
                    Resolution::HD,
                    Resolution::FULL_HD,
                    Resolution::QHD,
                    Resolution::UHD,
                ],
                frame_rates: broadcast_rates.clone(),
                aspect_ratio: Some("16:9".into()),
                max_duration_secs: 12 * 3600,
                max_file_size_bytes: Some(256 * 1024 * 1024 * 1024),
            },
        ),
        (
            "web".to_string(),
            ComplianceProfile {
                container: Container::Mp4,
                video_codec: VideoCodec::H264,
                audio_codec: AudioCodec::Aac,
                resolutions: vec![Resolution::HD, Resolution::FULL_HD],
                frame_rates: vec![24.0, 25.0, 30.0],
                aspect_ratio: Some("16:9".into()),
                max_duration_secs: 3600,
                max_file_size_bytes: Some(2 * 1024 * 1024 * 1024),
            },
        ),
        (
            "archive".to_string(),
            ComplianceProfile {
                container: Container::Mkv,
                video_codec: VideoCodec::H265,
                audio_codec: AudioCodec::Flac,
                resolutions: vec![
                    Resolution::HD,
                    Resolution::FULL_HD,
                    Resolution::QHD,
                    Resolution::UHD,
                ],
                frame_rates: broadcast_rates,
                aspect_ratio: None,
                max_duration_secs: 24 * 3600,
                max_file_size_bytes: None,
            },
        ),
    ]);

    let transition = |kind, duration_secs| TransitionSpec {
        kind,
        duration_secs,
    };
    let transitions = BTreeMap::from([
        ("fade".to_string(), transition(TransitionKind::Fade, 1.0)),
        ("dissolve".to_string(), transition(TransitionKind::Dissolve, 1.0)),
        ("wipe".to_string(), transition(TransitionKind::WipeLeft, 0.75)),
        ("slide".to_string(), transition(TransitionKind::SlideLeft, 0.75)),
        ("fade_black".to_string(), transition(TransitionKind::FadeBlack, 1.5)),
        ("fade_white".to_string(), transition(TransitionKind::FadeWhite, 1.0)),
        ("iris".to_string(), transition(TransitionKind::CircleOpen, 1.0)),
    ]);

    let grades = BTreeMap::from([
        ("neutral".to_string(), ColorGrade::new(0.0, 1.0, 1.0, 1.0, false)),
        ("warm".to_string(), ColorGrade::new(0.03, 1.05, 1.15, 0.95, false)),
        ("cool".to_string(), ColorGrade::new(0.0, 1.05, 0.9, 1.05, false)),
        ("vintage".to_string(), ColorGrade::new(0.05, 0.9, 0.7, 1.1, true)),
        ("vibrant".to_string(), ColorGrade::new(0.02, 1.1, 1.4, 1.0, false)),
        ("cinematic".to_string(), ColorGrade::new(-0.03, 1.2, 0.85, 1.0, true)),
    ]);

    PresetCatalog {
        quality_presets,
        compliance_profiles,
        transitions,
        grades,
    }
});

// ---------------------------------------------------------------------------
// PresetCatalog
// ---------------------------------------------------------------------------

/// Immutable lookup tables consulted while planning and running a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetCatalog {
    quality_presets: BTreeMap<String, QualityPreset>,
    compliance_profiles: BTreeMap<String, ComplianceProfile>,
    transitions: BTreeMap<String, TransitionSpec>,
    grades: BTreeMap<String, ColorGrade>,
}

impl PresetCatalog {
    /// The process-wide built-in tables.
    pub fn builtin() -> &'static PresetCatalog {
        &BUILTIN
    }

    /// Built-in tables overlaid with the user-defined entries from `config`.
    ///
    /// A user entry with the same name as a built-in replaces it.
    pub fn from_config(config: &Config) -> Self {
        let mut catalog = BUILTIN.clone();
        catalog
            .quality_presets
            .extend(config.quality_presets.clone());
        catalog
            .compliance_profiles
            .extend(config.compliance_profiles.clone());
        catalog.transitions.extend(config.transitions.clone());
        catalog.grades.extend(config.grades.clone());
        catalog
    }

    pub fn quality(&self, name: &str) -> Result<&QualityPreset> {
        self.quality_presets
            .get(name)
            .ok_or_else(|| unknown("quality preset", name, self.quality_presets.keys()))
    }

    pub fn profile(&self, name: &str) -> Result<&ComplianceProfile> {
        self.compliance_profiles
            .get(name)
            .ok_or_else(|| unknown("compliance profile", name, self.compliance_profiles.keys()))
    }

    /// Look up a transition. [`CUT`] resolves to `None`.
    pub fn transition(&self, name: &str) -> Result<Option<TransitionSpec>> {
        if name == CUT {
            return Ok(None);
        }
        self.transitions
            .get(name)
            .copied()
            .map(Some)
            .ok_or_else(|| unknown("transition", name, self.transitions.keys()))
    }

    pub fn grade(&self, name: &str) -> Result<&ColorGrade> {
        self.grades
            .get(name)
            .ok_or_else(|| unknown("grade", name, self.grades.keys()))
    }

    pub fn quality_presets(&self) -> impl Iterator<Item = (&String, &QualityPreset)> {
        self.quality_presets.iter()
    }

    pub fn compliance_profiles(&self) -> impl Iterator<Item = (&String, &ComplianceProfile)> {
        self.compliance_profiles.iter()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (&String, &TransitionSpec)> {
        self.transitions.iter()
    }

    pub fn grades(&self) -> impl Iterator<Item = (&String, &ColorGrade)> {
        self.grades.iter()
    }
}

fn unknown<'a>(what: &str, name: &str, known: impl Iterator<Item = &'a String>) -> Error {
    let known: Vec<&str> = known.map(String::as_str).collect();
    Error::Validation(format!(
        "unknown {what} '{name}' (known: {})",
        known.join(", ")
    ))
}
