//! Pipeline executor: the single driver loop that runs a plan's stages in
//! order, with fail-fast error handling, per-stage timeouts, cancellation at
//! stage boundaries and weighted progress.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ef_av::MediaInfo;

use crate::context::StageContext;
use crate::result::StageTiming;
use crate::stage::{Stage, StageId, StageInputs, StageOutput};
use crate::state::RunState;

/// A failure attributed to the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("stage {stage} failed: {error}")]
pub struct StageError {
    pub stage: StageId,
    pub error: ef_core::Error,
}

impl StageError {
    pub fn new(stage: StageId, error: ef_core::Error) -> Self {
        Self { stage, error }
    }
}

/// The published episode of a successful run.
#[derive(Debug, Clone)]
pub struct Published {
    pub output: PathBuf,
    /// Probe of the validated export, if the last stage made one.
    pub media: Option<MediaInfo>,
}

/// What happened during [`PipelineExecutor::execute`].
#[derive(Debug)]
pub struct ExecutionReport {
    /// Terminal state of the run.
    pub state: RunState,
    /// One entry per stage that started, in order.
    pub timings: Vec<StageTiming>,
    pub outcome: Result<Published, StageError>,
}

/// Runs stages strictly one after another.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    stage_timeout: Duration,
}

impl PipelineExecutor {
    /// Create a new executor from an ordered list of stages.
    pub fn new(stages: Vec<Box<dyn Stage>>, stage_timeout: Duration) -> Self {
        Self {
            stages,
            stage_timeout,
        }
    }

    /// Stage ids in execution order.
    pub fn plan(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Compute the total weight of all stages.
    fn total_weight(&self) -> f32 {
        self.stages.iter().map(|s| s.weight()).sum()
    }

    /// Run every stage, then publish the last stage's artifact to `output`.
    ///
    /// `state` is the run's state on entry (normally running the prepare
    /// step); the report carries the terminal state. Temporary artifacts are
    /// not released here: the owner of the artifact manager does that once,
    /// whatever the outcome.
    pub async fn execute(
        &self,
        ctx: &StageContext,
        output: &Path,
        mut state: RunState,
    ) -> ExecutionReport {
        let mut timings = Vec::with_capacity(self.stages.len() + 1);
        let outcome = self.run(ctx, output, &mut state, &mut timings).await;

        let terminal = if outcome.is_ok() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        if let Err(e) = state.advance(terminal) {
            tracing::warn!(run_id = %ctx.run_id, "{e}");
        }

        ExecutionReport {
            state,
            timings,
            outcome,
        }
    }

    async fn run(
        &self,
        ctx: &StageContext,
        output: &Path,
        state: &mut RunState,
        timings: &mut Vec<StageTiming>,
    ) -> Result<Published, StageError> {
        let Some(last) = self.stages.last() else {
            return Err(StageError::new(
                StageId::Prepare,
                ef_core::Error::Internal("no stages to execute".into()),
            ));
        };
        let last_id = last.id();

        // Validate all stages first.
        for stage in &self.stages {
            stage
                .validate(ctx)
                .await
                .map_err(|e| StageError::new(stage.id(), e))?;
        }

        let total_weight = self.total_weight();
        let mut completed_weight: f32 = 0.0;
        let mut produced: HashMap<StageId, StageOutput> = HashMap::new();

        for stage in &self.stages {
            let id = stage.id();
            self.enter(ctx, state, id)?;

            let mut inputs = StageInputs::default();
            for dep in stage.inputs() {
                let artifact = produced.get(&dep).map(|o| o.artifact.clone()).ok_or_else(|| {
                    StageError::new(
                        id,
                        ef_core::Error::Internal(format!("{id} needs {dep}, which has not run")),
                    )
                })?;
                inputs.insert(dep, artifact);
            }

            tracing::info!(run_id = %ctx.run_id, stage = %id, "Starting stage");
            let started = Instant::now();
            let result = match tokio::time::timeout(self.stage_timeout, stage.execute(ctx, &inputs)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ef_core::Error::stage(
                    id,
                    format!("timed out after {:?}", self.stage_timeout),
                )),
            };
            let elapsed = started.elapsed();
            timings.push(StageTiming { stage: id, elapsed });

            match result {
                Ok(out) => {
                    completed_weight += stage.weight();
                    let pct = if total_weight > 0.0 {
                        (completed_weight / total_weight) * 100.0
                    } else {
                        100.0
                    };
                    ctx.progress.send(pct.min(99.0), &id.to_string());
                    tracing::info!(
                        run_id = %ctx.run_id,
                        stage = %id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "[{:.0}%] {}",
                        pct,
                        out.summary
                    );
                    produced.insert(id, out);
                }
                Err(e) => {
                    tracing::error!(run_id = %ctx.run_id, stage = %id, kind = %e.kind(), "Stage failed: {e}");
                    return Err(StageError::new(id, e));
                }
            }
        }

        self.enter(ctx, state, StageId::Finalize)?;
        let started = Instant::now();
        let last = produced
            .remove(&last_id)
            .ok_or_else(|| {
                StageError::new(
                    StageId::Finalize,
                    ef_core::Error::Internal(format!("no artifact from {last_id}")),
                )
            })?;
        let published = ctx
            .artifacts
            .persist(&last.artifact, output)
            .map_err(|e| StageError::new(StageId::Finalize, e))?;
        timings.push(StageTiming {
            stage: StageId::Finalize,
            elapsed: started.elapsed(),
        });

        ctx.progress.send(100.0, "Finalizing");
        tracing::info!(run_id = %ctx.run_id, output = %published.display(), "[100%] Published episode");

        Ok(Published {
            output: published,
            media: last.media,
        })
    }

    /// Cross a stage boundary: honour cancellation, then record the new state.
    fn enter(&self, ctx: &StageContext, state: &mut RunState, id: StageId) -> Result<(), StageError> {
        if ctx.cancellation.is_cancelled() {
            tracing::info!(run_id = %ctx.run_id, stage = %id, "Pipeline cancelled");
            return Err(StageError::new(id, ef_core::Error::Cancelled));
        }
        state
            .advance(RunState::Running(id))
            .map_err(|e| StageError::new(id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Collaborators, ProgressSender};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use ef_av::{
        ArtifactManager, CardSpec, EncodeTarget, Encoder, ImageRenderer, Prober,
    };
    use ef_core::{ColorGrade, ErrorKind, PresetCatalog, RunId, TransitionSpec};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    // -- Helpers --------------------------------------------------------------

    struct Unused;

    #[async_trait]
    impl Encoder for Unused {
        fn name(&self) -> &'static str {
            "unused"
        }
        async fn compose_scene(&self, _: &Path, _: &Path, _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
        async fn concat(&self, _: &[PathBuf], _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
        async fn transition(&self, _: &Path, _: &Path, _: &TransitionSpec, _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
        async fn grade(&self, _: &Path, _: &ColorGrade, _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
        async fn export(&self, _: &Path, _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
    }

    #[async_trait]
    impl ImageRenderer for Unused {
        fn name(&self) -> &'static str {
            "unused"
        }
        async fn render_card(&self, _: &CardSpec, _: &Path, _: &EncodeTarget) -> ef_core::Result<()> {
            unreachable!()
        }
    }

    #[async_trait]
    impl Prober for Unused {
        fn name(&self) -> &'static str {
            "unused"
        }
        async fn probe(&self, _: &Path) -> ef_core::Result<MediaInfo> {
            unreachable!()
        }
    }

    fn make_ctx(work: &Path) -> StageContext {
        let preset = PresetCatalog::builtin().quality("draft").unwrap();
        let profile = PresetCatalog::builtin().profile("web").unwrap();
        let artifacts = Arc::new(ArtifactManager::new(work, RunId::new()).unwrap());
        StageContext::new(
            artifacts,
            Collaborators {
                encoder: Arc::new(Unused),
                renderer: Arc::new(Unused),
                prober: Arc::new(Unused),
            },
            EncodeTarget::intermediate(preset, 18),
            EncodeTarget::from_preset(preset, profile),
        )
    }

    fn running() -> RunState {
        RunState::Running(StageId::Prepare)
    }

    // -- Fake stages ----------------------------------------------------------

    /// Writes its own artifact and counts executions.
    struct FakeOk {
        id: StageId,
        deps: Vec<StageId>,
        executed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Stage for FakeOk {
        fn id(&self) -> StageId {
            self.id
        }
        fn inputs(&self) -> Vec<StageId> {
            self.deps.clone()
        }
        async fn execute(&self, ctx: &StageContext, inputs: &StageInputs) -> ef_core::Result<StageOutput> {
            assert_eq!(inputs.len(), self.deps.len());
            self.executed.fetch_add(1, Ordering::SeqCst);
            let out = ctx.acquire_intermediate(self.id, "")?;
            std::fs::write(out.path(), self.id.to_string())?;
            Ok(StageOutput::new(out, format!("{} done", self.id)))
        }
    }

    struct FakeFail {
        id: StageId,
    }

    #[async_trait]
    impl Stage for FakeFail {
        fn id(&self) -> StageId {
            self.id
        }
        async fn execute(&self, _ctx: &StageContext, _inputs: &StageInputs) -> ef_core::Result<StageOutput> {
            Err(ef_core::Error::tool("ffmpeg", "intentional failure"))
        }
    }

    struct FakeValidateFail;

    #[async_trait]
    impl Stage for FakeValidateFail {
        fn id(&self) -> StageId {
            StageId::Grade
        }
        async fn validate(&self, _ctx: &StageContext) -> ef_core::Result<()> {
            Err(ef_core::Error::Validation("grade out of range".into()))
        }
        async fn execute(&self, _ctx: &StageContext, _inputs: &StageInputs) -> ef_core::Result<StageOutput> {
            unreachable!()
        }
    }

    struct FakeSlow;

    #[async_trait]
    impl Stage for FakeSlow {
        fn id(&self) -> StageId {
            StageId::Export
        }
        async fn execute(&self, _ctx: &StageContext, _inputs: &StageInputs) -> ef_core::Result<StageOutput> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    fn ok(id: StageId, deps: Vec<StageId>, counter: &Arc<AtomicUsize>) -> Box<dyn Stage> {
        Box::new(FakeOk {
            id,
            deps,
            executed: counter.clone(),
        })
    }

    // -- Tests ----------------------------------------------------------------

    #[tokio::test]
    async fn empty_pipeline_errors() {
        let work = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let executor = PipelineExecutor::new(vec![], Duration::from_secs(5));
        let report = executor.execute(&ctx, &work.path().join("out.mkv"), running()).await;
        assert_eq!(report.state, RunState::Failed);
        assert_matches!(report.outcome, Err(StageError { stage: StageId::Prepare, .. }));
    }

    #[tokio::test]
    async fn stages_run_in_order_and_publish_last_artifact() {
        let work = tempfile::TempDir::new().unwrap();
        let out_dir = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(
            vec![
                ok(StageId::TitleCard, vec![], &counter),
                ok(StageId::Assemble, vec![StageId::TitleCard], &counter),
                ok(StageId::Export, vec![StageId::Assemble], &counter),
            ],
            Duration::from_secs(5),
        );
        assert_eq!(executor.plan().len(), 3);

        let output = out_dir.path().join("episode.mkv");
        let report = executor.execute(&ctx, &output, running()).await;
        let published = report.outcome.unwrap();
        assert_eq!(published.output, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "export");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(report.state, RunState::Succeeded);

        let stages: Vec<StageId> = report.timings.iter().map(|t| t.stage).collect();
        assert_eq!(
            stages,
            vec![StageId::TitleCard, StageId::Assemble, StageId::Export, StageId::Finalize]
        );
    }

    #[tokio::test]
    async fn failure_stops_pipeline_and_names_stage() {
        let work = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let counter = Arc::new(AtomicUsize::new(0));
        let output = work.path().join("never.mkv");
        let executor = PipelineExecutor::new(
            vec![
                ok(StageId::TitleCard, vec![], &counter),
                Box::new(FakeFail {
                    id: StageId::ComposeScene { scene: 1 },
                }),
                ok(StageId::Assemble, vec![], &counter),
            ],
            Duration::from_secs(5),
        );

        let report = executor.execute(&ctx, &output, running()).await;
        let err = report.outcome.unwrap_err();
        assert_eq!(err.stage, StageId::ComposeScene { scene: 1 });
        assert_eq!(err.error.kind(), ErrorKind::StageExecutionFailure);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(report.timings.len(), 2);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn validation_failure_prevents_execution() {
        let work = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(
            vec![ok(StageId::TitleCard, vec![], &counter), Box::new(FakeValidateFail)],
            Duration::from_secs(5),
        );

        let report = executor.execute(&ctx, &work.path().join("o.mkv"), running()).await;
        let err = report.outcome.unwrap_err();
        assert_eq!(err.stage, StageId::Grade);
        assert_eq!(err.error.kind(), ErrorKind::InvalidRequest);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(report.timings.is_empty());
    }

    #[tokio::test]
    async fn missing_dependency_is_internal_error() {
        let work = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(
            vec![ok(StageId::Export, vec![StageId::Credits], &counter)],
            Duration::from_secs(5),
        );

        let report = executor.execute(&ctx, &work.path().join("o.mkv"), running()).await;
        assert_eq!(report.outcome.unwrap_err().error.kind(), ErrorKind::Internal);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_pipeline() {
        let work = tempfile::TempDir::new().unwrap();
        let token = CancellationToken::new();
        let ctx = make_ctx(work.path()).with_cancellation(token.clone());
        token.cancel();

        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(
            vec![ok(StageId::TitleCard, vec![], &counter)],
            Duration::from_secs(5),
        );
        let report = executor.execute(&ctx, &work.path().join("o.mkv"), running()).await;
        let err = report.outcome.unwrap_err();
        assert_matches!(err.error, ef_core::Error::Cancelled);
        assert_eq!(err.stage, StageId::TitleCard);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(report.state, RunState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_timeout_is_execution_failure() {
        let work = tempfile::TempDir::new().unwrap();
        let ctx = make_ctx(work.path());
        let executor = PipelineExecutor::new(vec![Box::new(FakeSlow)], Duration::from_secs(1));

        let report = executor.execute(&ctx, &work.path().join("o.mkv"), running()).await;
        let err = report.outcome.unwrap_err();
        assert_eq!(err.stage, StageId::Export);
        assert_eq!(err.error.kind(), ErrorKind::StageExecutionFailure);
        assert!(err.error.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn progress_reporting() {
        let work = tempfile::TempDir::new().unwrap();
        let reports = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = reports.clone();
        let ctx = make_ctx(work.path()).with_progress(ProgressSender::new(move |pct, step| {
            sink.lock().push((pct, step.to_string()));
        }));

        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(
            vec![
                ok(StageId::TitleCard, vec![], &counter),
                ok(StageId::Credits, vec![], &counter),
            ],
            Duration::from_secs(5),
        );
        let report = executor.execute(&ctx, &work.path().join("o.mkv"), running()).await;
        assert!(report.outcome.is_ok());

        let rpts = reports.lock();
        // Two stages + "Finalizing"
        assert_eq!(rpts.len(), 3);
        assert_eq!(rpts[0], (50.0, "title_card".to_string()));
        assert_eq!(rpts[2], (100.0, "Finalizing".to_string()));
    }
}
