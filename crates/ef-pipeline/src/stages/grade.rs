//! Optional colour grading of the assembled episode.

use async_trait::async_trait;
use ef_core::ColorGrade;

use crate::context::StageContext;
use crate::stage::{ensure_produced, Stage, StageId, StageInputs, StageOutput};

/// Apply a named colour grade to the assembled episode.
#[derive(Debug)]
pub struct GradeStage {
    name: String,
    grade: ColorGrade,
}

impl GradeStage {
    pub fn new(name: impl Into<String>, grade: ColorGrade) -> Self {
        Self {
            name: name.into(),
            grade,
        }
    }
}

#[async_trait]
impl Stage for GradeStage {
    fn id(&self) -> StageId {
        StageId::Grade
    }

    fn inputs(&self) -> Vec<StageId> {
        vec![StageId::Assemble]
    }

    async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
        self.grade.validate()
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let input = inputs.get(StageId::Assemble)?;
        let output = ctx.acquire_intermediate(self.id(), &self.name)?;
        ctx.encoder()
            .grade(input.path(), &self.grade, output.path(), &ctx.intermediate)
            .await?;
        ensure_produced(self.id(), &output)?;

        Ok(StageOutput::new(output, format!("applied grade '{}'", self.name)))
    }

    fn weight(&self) -> f32 {
        2.0
    }
}
