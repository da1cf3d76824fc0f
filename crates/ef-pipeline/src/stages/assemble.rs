//! Scene assembly: title card, then every scene in order, joined by cuts or
//! transitions.

use std::path::PathBuf;

use async_trait::async_trait;
use ef_av::ArtifactHandle;
use ef_core::TransitionSpec;

use crate::context::StageContext;
use crate::stage::{ensure_produced, Stage, StageId, StageInputs, StageOutput};

/// Join the title card and composed scenes into one clip.
///
/// `junctions[i]` joins scene `i + 1` to scene `i + 2`; `None` is a hard cut.
/// The title card always cuts into the first scene.
#[derive(Debug)]
pub struct AssembleStage {
    scenes: usize,
    junctions: Vec<Option<TransitionSpec>>,
}

impl AssembleStage {
    pub fn new(scenes: usize, junctions: Vec<Option<TransitionSpec>>) -> Self {
        Self { scenes, junctions }
    }

    /// Number of transition calls this stage will make.
    pub fn transition_count(&self) -> usize {
        self.junctions.iter().flatten().count()
    }
}

#[async_trait]
impl Stage for AssembleStage {
    fn id(&self) -> StageId {
        StageId::Assemble
    }

    fn inputs(&self) -> Vec<StageId> {
        std::iter::once(StageId::TitleCard)
            .chain((1..=self.scenes).map(|scene| StageId::ComposeScene { scene }))
            .collect()
    }

    async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
        if self.scenes == 0 {
            return Err(ef_core::Error::Validation("nothing to assemble".into()));
        }
        if self.junctions.len() != self.scenes - 1 {
            return Err(ef_core::Error::Internal(format!(
                "{} junctions for {} scenes",
                self.junctions.len(),
                self.scenes
            )));
        }
        if let Some(spec) = self.junctions.iter().flatten().find(|s| !(s.duration_secs > 0.0)) {
            return Err(ef_core::Error::Validation(format!(
                "{} transition duration must be positive",
                spec.kind
            )));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let title = inputs.get(StageId::TitleCard)?.path().to_path_buf();
        let scenes = (1..=self.scenes)
            .map(|scene| Ok(inputs.get(StageId::ComposeScene { scene })?.path().to_path_buf()))
            .collect::<ef_core::Result<Vec<PathBuf>>>()?;

        let mut joins = 0usize;
        let mut next_artifact = |ctx: &StageContext| -> ef_core::Result<ArtifactHandle> {
            joins += 1;
            ctx.acquire_intermediate(StageId::Assemble, &format!("join{joins}"))
        };

        // Clips waiting to be joined by hard cuts. A transition first flushes
        // them into one clip, then blends that into the next scene.
        let mut pending: Vec<PathBuf> = vec![title, scenes[0].clone()];
        let mut last: Option<ArtifactHandle> = None;

        for (i, junction) in self.junctions.iter().enumerate() {
            let next_scene = &scenes[i + 1];
            match junction {
                None => pending.push(next_scene.clone()),
                Some(spec) => {
                    let left = if pending.len() == 1 {
                        pending[0].clone()
                    } else {
                        let joined = next_artifact(ctx)?;
                        ctx.encoder()
                            .concat(&pending, joined.path(), &ctx.intermediate)
                            .await?;
                        ensure_produced(self.id(), &joined)?;
                        joined.path().to_path_buf()
                    };

                    let blended = next_artifact(ctx)?;
                    tracing::debug!(
                        scene = i + 2,
                        kind = %spec.kind,
                        duration = spec.duration_secs,
                        "transition into scene"
                    );
                    ctx.encoder()
                        .transition(&left, next_scene, spec, blended.path(), &ctx.intermediate)
                        .await?;
                    ensure_produced(self.id(), &blended)?;
                    pending = vec![blended.path().to_path_buf()];
                    last = Some(blended);
                }
            }
        }

        let output = match last {
            Some(handle) if pending.len() == 1 => handle,
            _ => {
                let joined = next_artifact(ctx)?;
                ctx.encoder()
                    .concat(&pending, joined.path(), &ctx.intermediate)
                    .await?;
                ensure_produced(self.id(), &joined)?;
                joined
            }
        };

        Ok(StageOutput::new(
            output,
            format!(
                "assembled {} scenes with {} transitions",
                self.scenes,
                self.transition_count()
            ),
        ))
    }

    fn weight(&self) -> f32 {
        2.0
    }
}
