//! Delivery export.

use async_trait::async_trait;

use crate::context::StageContext;
use crate::stage::{ensure_produced, Stage, StageId, StageInputs, StageOutput};

/// Transcode the finished episode to the delivery target.
#[derive(Debug, Default)]
pub struct ExportStage;

impl ExportStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for ExportStage {
    fn id(&self) -> StageId {
        StageId::Export
    }

    fn inputs(&self) -> Vec<StageId> {
        vec![StageId::Credits]
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let input = inputs.get(StageId::Credits)?;
        let output = ctx.acquire_delivery(self.id())?;
        ctx.encoder()
            .export(input.path(), output.path(), &ctx.delivery)
            .await?;
        ensure_produced(self.id(), &output)?;

        Ok(StageOutput::new(
            output,
            format!(
                "exported {} {}/{} at {}",
                ctx.delivery.container,
                ctx.delivery.video_codec,
                ctx.delivery.audio_codec,
                ctx.delivery.resolution
            ),
        ))
    }

    fn weight(&self) -> f32 {
        3.0
    }
}
