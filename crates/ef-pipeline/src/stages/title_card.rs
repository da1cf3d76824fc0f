//! Opening title card.

use async_trait::async_trait;
use ef_av::CardSpec;

use crate::context::StageContext;
use crate::stage::{ensure_produced, Stage, StageId, StageInputs, StageOutput};

/// Render the title card clip.
#[derive(Debug)]
pub struct TitleCardStage {
    card: CardSpec,
}

impl TitleCardStage {
    pub fn new(card: CardSpec) -> Self {
        Self { card }
    }
}

#[async_trait]
impl Stage for TitleCardStage {
    fn id(&self) -> StageId {
        StageId::TitleCard
    }

    async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
        if self.card.duration.is_zero() {
            return Err(ef_core::Error::Validation(
                "title card duration must be positive".into(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        _inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let output = ctx.acquire_intermediate(self.id(), "")?;
        ctx.renderer()
            .render_card(&self.card, output.path(), &ctx.intermediate)
            .await?;
        ensure_produced(self.id(), &output)?;

        Ok(StageOutput::new(
            output,
            format!("rendered title card ({} lines)", self.card.lines.len()),
        ))
    }
}
