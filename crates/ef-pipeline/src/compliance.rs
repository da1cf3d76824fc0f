//! Platform compliance checks for an exported episode.

use std::fmt;

use ef_av::MediaInfo;
use ef_core::ComplianceProfile;
use serde::Serialize;

/// Accepted frame-rate deviation in frames per second.
const FRAME_RATE_TOLERANCE: f64 = 0.01;
/// Accepted relative aspect-ratio deviation.
const ASPECT_TOLERANCE: f64 = 0.01;

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Constraint name (`container`, `resolution`, ...).
    pub constraint: &'static str,
    pub expected: String,
    pub actual: String,
}

impl Violation {
    fn new(constraint: &'static str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            constraint,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.constraint, self.expected, self.actual
        )
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every way `info` fails to satisfy `profile`. Empty means compliant.
pub fn check_compliance(info: &MediaInfo, profile: &ComplianceProfile) -> Vec<Violation> {
    let mut violations = Vec::new();

    if info.container != Some(profile.container) {
        violations.push(Violation::new(
            "container",
            profile.container.to_string(),
            describe_or(&info.container, &info.format_name),
        ));
    }

    match &info.video {
        None => violations.push(Violation::new("video stream", "present", "missing")),
        Some(video) => {
            if video.codec != Some(profile.video_codec) {
                violations.push(Violation::new(
                    "video codec",
                    profile.video_codec.to_string(),
                    video.codec_name.clone(),
                ));
            }

            let resolution = video.resolution();
            if !profile.resolutions.is_empty() && !profile.resolutions.contains(&resolution) {
                violations.push(Violation::new(
                    "resolution",
                    format!("one of {}", join(&profile.resolutions)),
                    resolution.to_string(),
                ));
            }

            if !profile.frame_rates.is_empty() {
                let allowed = video.frame_rate.is_some_and(|fps| {
                    profile
                        .frame_rates
                        .iter()
                        .any(|r| (fps - r).abs() <= FRAME_RATE_TOLERANCE)
                });
                if !allowed {
                    violations.push(Violation::new(
                        "frame rate",
                        format!("one of {}", join(&profile.frame_rates)),
                        video
                            .frame_rate
                            .map(|r| format!("{r:.3}"))
                            .unwrap_or_else(|| "unknown".into()),
                    ));
                }
            }

            if let Some(required) = profile.aspect_ratio_value() {
                let actual = resolution.aspect_ratio();
                if !actual.is_finite() || ((actual - required) / required).abs() > ASPECT_TOLERANCE {
                    violations.push(Violation::new(
                        "aspect ratio",
                        profile.aspect_ratio.clone().unwrap_or_default(),
                        format!("{actual:.3}"),
                    ));
                }
            }
        }
    }

    match &info.audio {
        None => violations.push(Violation::new("audio stream", "present", "missing")),
        Some(audio) if audio.codec != Some(profile.audio_codec) => {
            violations.push(Violation::new(
                "audio codec",
                profile.audio_codec.to_string(),
                audio.codec_name.clone(),
            ));
        }
        Some(_) => {}
    }

    let max_duration = profile.max_duration_secs as f64;
    match info.duration {
        None => violations.push(Violation::new(
            "duration",
            format!("at most {max_duration}s"),
            "unknown",
        )),
        Some(d) if d.as_secs_f64() > max_duration => violations.push(Violation::new(
            "duration",
            format!("at most {max_duration}s"),
            format!("{:.3}s", d.as_secs_f64()),
        )),
        Some(_) => {}
    }

    if let Some(max) = profile.max_file_size_bytes {
        if info.file_size > max {
            violations.push(Violation::new(
                "file size",
                format!("at most {max} bytes"),
                format!("{} bytes", info.file_size),
            ));
        }
    }

    violations
}

fn describe_or<T: fmt::Display>(value: &Option<T>, fallback: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None if fallback.is_empty() => "unknown".into(),
        None => fallback.to_string(),
    }
}
