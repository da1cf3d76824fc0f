//! Scene composition: animation + narration into one clip.

use async_trait::async_trait;

use crate::context::StageContext;
use crate::request::SceneDescriptor;
use crate::stage::{ensure_produced, require_input, Stage, StageId, StageInputs, StageOutput};

/// Compose one scene at the intermediate target.
#[derive(Debug)]
pub struct ComposeSceneStage {
    /// 1-based position in the episode.
    scene: usize,
    descriptor: SceneDescriptor,
}

impl ComposeSceneStage {
    pub fn new(scene: usize, descriptor: SceneDescriptor) -> Self {
        Self { scene, descriptor }
    }
}

#[async_trait]
impl Stage for ComposeSceneStage {
    fn id(&self) -> StageId {
        StageId::ComposeScene { scene: self.scene }
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        _inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        // Inputs are checked now rather than at submission: they may be
        // produced upstream while earlier stages run.
        require_input(&self.descriptor.animation)?;
        require_input(&self.descriptor.audio)?;

        let output = ctx.acquire_intermediate(self.id(), "")?;
        ctx.encoder()
            .compose_scene(
                &self.descriptor.animation,
                &self.descriptor.audio,
                output.path(),
                &ctx.intermediate,
            )
            .await?;
        ensure_produced(self.id(), &output)?;

        Ok(StageOutput::new(
            output,
            format!(
                "composed scene {} from {}",
                self.scene,
                self.descriptor.animation.display()
            ),
        ))
    }

    fn weight(&self) -> f32 {
        2.0
    }
}
