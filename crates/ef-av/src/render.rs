//! The image-render collaborator: title cards and credits.
//!
//! A card is a short clip of centred text lines over a solid background with
//! a silent audio track, so it can be joined with scenes without special
//! casing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::actions;
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// One line of text on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLine {
    pub text: String,
    /// Font size in pixels at 1080 lines; scaled with the target height.
    pub size: u32,
}

impl CardLine {
    pub fn new(text: impl Into<String>, size: u32) -> Self {
        Self {
            text: text.into(),
            size,
        }
    }
}

/// Layout of a title card or credits roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSpec {
    pub lines: Vec<CardLine>,
    pub duration: Duration,
    /// ffmpeg colour (`black`, `#1a1a2e`, ...).
    pub background: String,
    pub foreground: String,
    /// Fade in and out length; zero disables.
    pub fade: Duration,
}

/// Opaque card rendering operation the pipeline delegates to.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `card` to a clip at `output` matching `target`.
    async fn render_card(
        &self,
        card: &CardSpec,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()>;
}

/// ffmpeg `lavfi` + `drawtext` backed [`ImageRenderer`].
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    tools: Arc<ToolRegistry>,
}

impl FfmpegRenderer {
    pub fn new(tools: Arc<ToolRegistry>) -> ef_core::Result<Self> {
        tools.require("ffmpeg")?;
        Ok(Self { tools })
    }
}

#[async_trait]
impl ImageRenderer for FfmpegRenderer {
    fn name(&self) -> &'static str {
        "ffmpeg-drawtext"
    }

    async fn render_card(
        &self,
        card: &CardSpec,
        output: &Path,
        target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        actions::render_card(&self.tools, card, output, target).await
    }
}
