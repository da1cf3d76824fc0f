//! Execution context shared by all stages in a production run.

use std::path::Path;
use std::sync::Arc;

use ef_av::{
    ArtifactHandle, ArtifactManager, EncodeTarget, Encoder, ImageRenderer, Prober,
};
use ef_core::RunId;
use tokio_util::sync::CancellationToken;

use crate::stage::StageId;

/// Sender for reporting progress from a run.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// human-readable step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Collaborators a run delegates the actual media work to.
#[derive(Clone)]
pub struct Collaborators {
    pub encoder: Arc<dyn Encoder>,
    pub renderer: Arc<dyn ImageRenderer>,
    pub prober: Arc<dyn Prober>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("encoder", &self.encoder.name())
            .field("renderer", &self.renderer.name())
            .field("prober", &self.prober.name())
            .finish()
    }
}

/// Context passed to every stage during validation and execution.
pub struct StageContext {
    pub run_id: RunId,
    /// Owner of every temporary artifact of this run.
    pub artifacts: Arc<ArtifactManager>,
    pub collaborators: Collaborators,
    /// Target for working files passed between stages.
    pub intermediate: EncodeTarget,
    /// Target for the exported episode.
    pub delivery: EncodeTarget,
    /// Checked between stages; a running stage is never interrupted.
    pub cancellation: CancellationToken,
    pub progress: Arc<ProgressSender>,
}

impl StageContext {
    /// Create a context with no cancellation and no progress reporting.
    pub fn new(
        artifacts: Arc<ArtifactManager>,
        collaborators: Collaborators,
        intermediate: EncodeTarget,
        delivery: EncodeTarget,
    ) -> Self {
        Self {
            run_id: artifacts.run_id(),
            artifacts,
            collaborators,
            intermediate,
            delivery,
            cancellation: CancellationToken::new(),
            progress: Arc::new(ProgressSender::noop()),
        }
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    pub fn encoder(&self) -> &dyn Encoder {
        self.collaborators.encoder.as_ref()
    }

    pub fn renderer(&self) -> &dyn ImageRenderer {
        self.collaborators.renderer.as_ref()
    }

    pub fn prober(&self) -> &dyn Prober {
        self.collaborators.prober.as_ref()
    }

    /// Acquire a working-file artifact named after `stage`.
    pub fn acquire_intermediate(&self, stage: StageId, label: &str) -> ef_core::Result<ArtifactHandle> {
        self.artifacts
            .acquire_temp(&format!("{}.{}", artifact_stem(stage, label), self.intermediate.extension()))
    }

    /// Acquire an artifact in the delivery container.
    pub fn acquire_delivery(&self, stage: StageId) -> ef_core::Result<ArtifactHandle> {
        self.artifacts
            .acquire_temp(&format!("{}.{}", artifact_stem(stage, ""), self.delivery.extension()))
    }

    /// The run's namespace directory.
    pub fn namespace(&self) -> &Path {
        self.artifacts.namespace()
    }
}

/// `compose_scene[2]` is awkward in a file name; use `compose_scene-2`.
fn artifact_stem(stage: StageId, label: &str) -> String {
    let base = match stage {
        StageId::ComposeScene { scene } => format!("compose_scene-{scene}"),
        other => other.to_string(),
    };
    if label.is_empty() {
        base
    } else {
        format!("{base}-{label}")
    }
}
