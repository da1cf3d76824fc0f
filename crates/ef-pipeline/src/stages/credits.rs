//! Closing credits, rendered and appended to the episode body.

use async_trait::async_trait;
use ef_av::CardSpec;

use crate::context::StageContext;
use crate::stage::{ensure_produced, Stage, StageId, StageInputs, StageOutput};

/// Render the credits card and append it after `body`.
#[derive(Debug)]
pub struct CreditsStage {
    card: CardSpec,
    /// Stage whose artifact is the episode body (assemble or grade).
    body: StageId,
}

impl CreditsStage {
    pub fn new(card: CardSpec, body: StageId) -> Self {
        Self { card, body }
    }
}

#[async_trait]
impl Stage for CreditsStage {
    fn id(&self) -> StageId {
        StageId::Credits
    }

    fn inputs(&self) -> Vec<StageId> {
        vec![self.body]
    }

    async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
        if self.card.duration.is_zero() {
            return Err(ef_core::Error::Validation(
                "credits duration must be positive".into(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let body = inputs.get(self.body)?;

        let card = ctx.acquire_intermediate(self.id(), "card")?;
        ctx.renderer()
            .render_card(&self.card, card.path(), &ctx.intermediate)
            .await?;
        ensure_produced(self.id(), &card)?;

        let output = ctx.acquire_intermediate(self.id(), "")?;
        ctx.encoder()
            .concat(
                &[body.path().to_path_buf(), card.path().to_path_buf()],
                output.path(),
                &ctx.intermediate,
            )
            .await?;
        ensure_produced(self.id(), &output)?;

        // The card is only needed for the join.
        if let Err(w) = ctx.artifacts.release(&card) {
            tracing::warn!(run_id = %ctx.run_id, "{w}");
        }

        Ok(StageOutput::new(output, "appended credits"))
    }
}
