//! The episode production request: everything a caller submits for one
//! episode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ef_av::actions::is_valid_color;
use ef_av::{CardLine, CardSpec};
use serde::{Deserialize, Serialize};

/// One scene: an animation clip and its narration audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub animation: PathBuf,
    pub audio: PathBuf,
    /// Transition into this scene from the previous one. Overrides the
    /// request-wide default; `"cut"` forces a hard cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

impl SceneDescriptor {
    pub fn new(animation: impl Into<PathBuf>, audio: impl Into<PathBuf>) -> Self {
        Self {
            animation: animation.into(),
            audio: audio.into(),
            transition: None,
        }
    }

    /// Builder: set the transition into this scene.
    pub fn with_transition(mut self, name: impl Into<String>) -> Self {
        self.transition = Some(name.into());
        self
    }
}

/// Title card layout. The text comes from the request's titles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleCardConfig {
    pub duration_secs: f64,
    pub subtitle: Option<String>,
    pub background: String,
    pub foreground: String,
    pub fade_secs: f64,
}

impl Default for TitleCardConfig {
    fn default() -> Self {
        Self {
            duration_secs: 4.0,
            subtitle: None,
            background: "black".into(),
            foreground: "white".into(),
            fade_secs: 0.5,
        }
    }
}

/// Credits layout and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditsConfig {
    pub duration_secs: f64,
    /// One card line each. Empty falls back to the show title.
    pub lines: Vec<String>,
    pub background: String,
    pub foreground: String,
    pub fade_secs: f64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            duration_secs: 6.0,
            lines: Vec::new(),
            background: "black".into(),
            foreground: "white".into(),
            fade_secs: 0.5,
        }
    }
}

/// A request to produce one episode.
///
/// Requests are plain data, loaded from TOML or JSON. Once handed to the
/// producer they are never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRequest {
    pub show_title: String,
    pub episode_title: String,
    pub episode_number: u32,
    pub season_number: u32,
    /// Scenes in playback order.
    pub scenes: Vec<SceneDescriptor>,
    #[serde(default)]
    pub title_card: TitleCardConfig,
    #[serde(default)]
    pub credits: CreditsConfig,
    /// Where the finished episode is written.
    pub output: PathBuf,
    /// Quality preset name; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Compliance profile name; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Default transition between adjacent scenes; hard cuts when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    /// Colour grade name; no grading when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

impl EpisodeRequest {
    /// Parse a request from TOML.
    pub fn from_toml_str(s: &str) -> ef_core::Result<Self> {
        toml::from_str(s)
            .map_err(|e| ef_core::Error::Validation(format!("invalid request TOML: {e}")))
    }

    /// Parse a request from JSON.
    pub fn from_json_str(s: &str) -> ef_core::Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| ef_core::Error::Validation(format!("invalid request JSON: {e}")))
    }

    /// Load a request file, JSON if the extension is `.json`, TOML otherwise.
    ///
    /// Relative scene and output paths are resolved against the directory
    /// containing the request file.
    pub fn from_path(path: &Path) -> ef_core::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ef_core::Error::Validation(format!("cannot read request {}: {e}", path.display()))
        })?;
        let request = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(request.resolve_relative(base))
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_relative(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for scene in &mut self.scenes {
            resolve(&mut scene.animation);
            resolve(&mut scene.audio);
        }
        resolve(&mut self.output);
        self
    }

    /// Structural checks that do not touch the filesystem.
    ///
    /// Scene files are checked when their stage runs, not here.
    pub fn validate(&self) -> ef_core::Result<()> {
        let invalid = |msg: String| Err(ef_core::Error::Validation(msg));

        if self.show_title.trim().is_empty() {
            return invalid("show_title must not be empty".into());
        }
        if self.episode_title.trim().is_empty() {
            return invalid("episode_title must not be empty".into());
        }
        if self.scenes.is_empty() {
            return invalid("an episode needs at least one scene".into());
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            if scene.animation.as_os_str().is_empty() || scene.audio.as_os_str().is_empty() {
                return invalid(format!("scene {} has an empty artifact path", i + 1));
            }
        }
        if !(self.title_card.duration_secs > 0.0) {
            return invalid("title_card.duration_secs must be positive".into());
        }
        if !(self.credits.duration_secs > 0.0) {
            return invalid("credits.duration_secs must be positive".into());
        }
        if self.title_card.fade_secs < 0.0 || self.credits.fade_secs < 0.0 {
            return invalid("fade_secs must not be negative".into());
        }
        for (field, color) in [
            ("title_card.background", &self.title_card.background),
            ("title_card.foreground", &self.title_card.foreground),
            ("credits.background", &self.credits.background),
            ("credits.foreground", &self.credits.foreground),
        ] {
            if !is_valid_color(color) {
                return invalid(format!(
                    "{field} {color:?} is not a colour name or #RRGGBB[AA] value"
                ));
            }
        }
        if self.output.file_name().is_none() {
            return invalid(format!(
                "output {} does not name a file",
                self.output.display()
            ));
        }
        Ok(())
    }

    /// `S01E02` style code.
    pub fn episode_code(&self) -> String {
        format!("S{:02}E{:02}", self.season_number, self.episode_number)
    }

    /// Layout of the opening title card.
    pub fn title_card_spec(&self) -> CardSpec {
        let mut lines = vec![
            CardLine::new(&self.show_title, 96),
            CardLine::new(
                format!(
                    "Season {} Episode {}",
                    self.season_number, self.episode_number
                ),
                44,
            ),
            CardLine::new(&self.episode_title, 64),
        ];
        if let Some(subtitle) = &self.title_card.subtitle {
            lines.push(CardLine::new(subtitle, 40));
        }
        CardSpec {
            lines,
            duration: secs(self.title_card.duration_secs),
            background: self.title_card.background.clone(),
            foreground: self.title_card.foreground.clone(),
            fade: secs(self.title_card.fade_secs),
        }
    }

    /// Layout of the closing credits.
    pub fn credits_spec(&self) -> CardSpec {
        let mut lines = vec![CardLine::new("Credits", 72)];
        if self.credits.lines.is_empty() {
            lines.push(CardLine::new(&self.show_title, 48));
        } else {
            lines.extend(self.credits.lines.iter().map(|l| CardLine::new(l, 40)));
        }
        CardSpec {
            lines,
            duration: secs(self.credits.duration_secs),
            background: self.credits.background.clone(),
            foreground: self.credits.foreground.clone(),
            fade: secs(self.credits.fade_secs),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
