//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! tool, pipeline and preset-table sections. Every section defaults sensibly
//! so a completely empty file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::presets::{ColorGrade, ComplianceProfile, PresetCatalog, QualityPreset, TransitionSpec};
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./episodeforge.toml",
    "~/.config/episodeforge/config.toml",
    "/etc/episodeforge/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub pipeline: PipelineConfig,
    pub quality_presets: BTreeMap<String, QualityPreset>,
    pub compliance_profiles: BTreeMap<String, ComplianceProfile>,
    pub transitions: BTreeMap<String, TransitionSpec>,
    pub grades: BTreeMap<String, ColorGrade>,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file. Missing or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Validation(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from `path`, or from the first of
    /// [`DEFAULT_CONFIG_PATHS`] that exists, or fall back to defaults.
    ///
    /// An explicitly given path must exist and parse.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("Loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let catalog = PresetCatalog::from_config(self);

        if catalog.quality(&self.pipeline.default_quality).is_err() {
            warnings.push(format!(
                "pipeline.default_quality '{}' is not a known quality preset",
                self.pipeline.default_quality
            ));
        }
        if catalog.profile(&self.pipeline.default_profile).is_err() {
            warnings.push(format!(
                "pipeline.default_profile '{}' is not a known compliance profile",
                self.pipeline.default_profile
            ));
        }
        if self.pipeline.stage_timeout_secs == 0 {
            warnings.push("pipeline.stage_timeout_secs is 0; every stage will time out".into());
        }
        if self.tools.timeout_secs == 0 {
            warnings.push("tools.timeout_secs is 0; every tool invocation will time out".into());
        }
        if self.pipeline.intermediate_crf > 51 {
            warnings.push(format!(
                "pipeline.intermediate_crf {} is above the encoder maximum of 51",
                self.pipeline.intermediate_crf
            ));
        }

        for (name, grade) in &self.grades {
            if let Err(e) = grade.validate() {
                warnings.push(format!("grades.{name}: {e}"));
            }
        }
        for (name, transition) in &self.transitions {
            if transition.duration_secs <= 0.0 {
                warnings.push(format!("transitions.{name}.duration_secs must be positive"));
            }
        }
        for (name, preset) in &self.quality_presets {
            if preset.frame_rate <= 0.0 {
                warnings.push(format!("quality_presets.{name}.frame_rate must be positive"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths and limits for external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Maximum wall time of a single tool invocation.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            timeout_secs: 1800,
        }
    }
}

/// Pipeline defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory in which each run creates its private artifact namespace.
    /// Defaults to the system temp directory.
    pub working_dir: Option<PathBuf>,
    /// Fixed upper bound on the wall time of any single stage.
    pub stage_timeout_secs: u64,
    /// Quality preset used when a request does not name one.
    pub default_quality: String,
    /// Compliance profile used when a request does not name one.
    pub default_profile: String,
    /// CRF for intermediate working files.
    pub intermediate_crf: u32,
}

impl PipelineConfig {
    /// The configured working directory or the system temp directory.
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            stage_timeout_secs: 3600,
            default_quality: "standard".into(),
            default_profile: "youtube".into(),
            intermediate_crf: 18,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::TransitionKind;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.pipeline.default_quality, "standard");
        assert_eq!(cfg.pipeline.default_profile, "youtube");
        assert_eq!(cfg.pipeline.stage_timeout_secs, 3600);
        assert_eq!(cfg.tools.timeout_secs, 1800);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.pipeline.intermediate_crf, 18);
        assert!(cfg.quality_presets.is_empty());
    }

    #[test]
    fn parse_sections_and_tables() {
        let toml = r#"
            [tools]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            timeout_secs = 60

            [pipeline]
            working_dir = "/scratch"
            default_quality = "draft"

            [transitions.snap]
            kind = "slideright"
            duration_secs = 0.3

            [grades.noir]
            saturation = 0.0
            contrast = 1.3
            vignette = true
        "#;
        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(
            cfg.tools.ffmpeg_path.as_deref(),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(cfg.tools.timeout_secs, 60);
        assert_eq!(cfg.pipeline.working_dir(), PathBuf::from("/scratch"));
        assert_eq!(cfg.transitions["snap"].kind, TransitionKind::SlideRight);
        let noir = cfg.grades["noir"];
        assert_eq!(noir.saturation, 0.0);
        assert_eq!(noir.gamma, 1.0);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn malformed_toml_is_validation_error() {
        let err = Config::from_toml_str("[pipeline\nfoo").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn unknown_defaults_warn() {
        let mut cfg = Config::default();
        cfg.pipeline.default_profile = "tiktok".into();
        cfg.pipeline.stage_timeout_secs = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("tiktok")));
        assert!(warnings.iter().any(|w| w.contains("stage_timeout_secs")));
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        assert!(Config::load_or_default(Some(Path::new("/nonexistent/ef.toml"))).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episodeforge.toml");
        std::fs::write(&path, "[pipeline]\nstage_timeout_secs = 5\n").unwrap();
        let cfg = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(cfg.pipeline.stage_timeout_secs, 5);
    }
}
