//! The [`Stage`] trait defines one step of episode production.
//!
//! A stage declares which earlier stages' artifacts it consumes, validates its
//! preconditions before anything runs, then produces exactly one artifact.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use ef_av::{ArtifactHandle, MediaInfo};
use serde::{Serialize, Serializer};

use crate::context::StageContext;

/// Identifies a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Request validation, planning and namespace setup.
    Prepare,
    TitleCard,
    /// Scene composition; `scene` is 1-based.
    ComposeScene { scene: usize },
    Assemble,
    Grade,
    Credits,
    Export,
    Validate,
    /// Publishing the validated artifact to the requested output path.
    Finalize,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => f.write_str("prepare"),
            Self::TitleCard => f.write_str("title_card"),
            Self::ComposeScene { scene } => write!(f, "compose_scene[{scene}]"),
            Self::Assemble => f.write_str("assemble"),
            Self::Grade => f.write_str("grade"),
            Self::Credits => f.write_str("credits"),
            Self::Export => f.write_str("export"),
            Self::Validate => f.write_str("validate"),
            Self::Finalize => f.write_str("finalize"),
        }
    }
}

impl Serialize for StageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of a successfully executed stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// The artifact this stage produced (or, for checks, passed through).
    pub artifact: ArtifactHandle,
    /// Human-readable summary of what the stage did.
    pub summary: String,
    /// Probe of the artifact, when the stage made one.
    pub media: Option<MediaInfo>,
}

impl StageOutput {
    pub fn new(artifact: ArtifactHandle, summary: impl Into<String>) -> Self {
        Self {
            artifact,
            summary: summary.into(),
            media: None,
        }
    }
}

/// Artifacts of the stages a stage declared in [`Stage::inputs`].
#[derive(Debug, Default)]
pub struct StageInputs {
    artifacts: HashMap<StageId, ArtifactHandle>,
}

impl StageInputs {
    pub fn insert(&mut self, stage: StageId, artifact: ArtifactHandle) {
        self.artifacts.insert(stage, artifact);
    }

    /// The artifact produced by `stage`.
    pub fn get(&self, stage: StageId) -> ef_core::Result<&ArtifactHandle> {
        self.artifacts.get(&stage).ok_or_else(|| {
            ef_core::Error::Internal(format!("no artifact from stage {stage}"))
        })
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// A single step in the production pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Stages whose artifacts this stage consumes. They must all run earlier.
    fn inputs(&self) -> Vec<StageId> {
        Vec::new()
    }

    /// Check preconditions before the pipeline starts.
    ///
    /// Called once for every stage before the first stage executes. Input
    /// files are not checked here: they must exist when the stage runs.
    async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
        Ok(())
    }

    /// Do the work.
    async fn execute(&self, ctx: &StageContext, inputs: &StageInputs)
        -> ef_core::Result<StageOutput>;

    /// Relative weight for progress reporting. Default is `1.0`.
    fn weight(&self) -> f32 {
        1.0
    }
}

/// Fail with [`ef_core::Error::MissingInputArtifact`] unless `path` is a
/// non-empty file.
pub fn require_input(path: &Path) -> ef_core::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if !meta.is_file() => Err(ef_core::Error::missing_input(path, "is not a file")),
        Ok(meta) if meta.len() == 0 => Err(ef_core::Error::missing_input(path, "is empty")),
        Ok(_) => Ok(()),
        Err(_) => Err(ef_core::Error::missing_input(path, "does not exist")),
    }
}

/// Fail with a stage error unless the collaborator actually wrote `artifact`.
pub fn ensure_produced(stage: StageId, artifact: &ArtifactHandle) -> ef_core::Result<()> {
    match std::fs::metadata(artifact.path()) {
        Ok(meta) if !meta.is_file() => Err(ef_core::Error::stage(
            stage,
            format!("produced {} but it is not a file", artifact.path().display()),
        )),
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(ef_core::Error::stage(
            stage,
            format!("produced an empty artifact {}", artifact.path().display()),
        )),
        Err(_) => Err(ef_core::Error::stage(
            stage,
            format!("did not produce {}", artifact.path().display()),
        )),
    }
}
