//! The episode producer: entry point for producing one episode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ef_av::{
    ArtifactManager, FfmpegEncoder, FfmpegRenderer, FfprobeProber, Prober, ToolRegistry,
};
use ef_core::config::Config;
use ef_core::{PresetCatalog, RunId};
use tokio_util::sync::CancellationToken;

use crate::context::{Collaborators, ProgressSender, StageContext};
use crate::executor::PipelineExecutor;
use crate::factory::{build_stages, StagePlan};
use crate::request::EpisodeRequest;
use crate::result::{ProductionResult, ProductionStatus, StageFailure, StageTiming};
use crate::stage::StageId;
use crate::state::RunState;

/// Produces episodes. Cheap to clone; clones share configuration and
/// collaborators but every run gets its own artifact namespace, so
/// concurrent runs never interfere.
#[derive(Clone, Debug)]
pub struct EpisodeProducer {
    config: Arc<Config>,
    catalog: Arc<PresetCatalog>,
    collaborators: Collaborators,
}

impl EpisodeProducer {
    /// Create a producer with explicit collaborators.
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let catalog = Arc::new(PresetCatalog::from_config(&config));
        Self {
            config: Arc::new(config),
            catalog,
            collaborators,
        }
    }

    /// Create a producer backed by ffmpeg and ffprobe found via `config.tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ef_core::Error::Tool`] if either tool cannot be found.
    pub fn with_ffmpeg(config: Config) -> ef_core::Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::from_registry(&tools)?);
        let collaborators = Collaborators {
            encoder: Arc::new(FfmpegEncoder::with_prober(tools.clone(), prober.clone())?),
            renderer: Arc::new(FfmpegRenderer::new(tools.clone())?),
            prober,
        };
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    /// Resolve `request` into a stage plan without running anything.
    pub fn plan(&self, request: &EpisodeRequest) -> ef_core::Result<StagePlan> {
        build_stages(request, &self.catalog, &self.config.pipeline)
    }

    /// Produce one episode.
    ///
    /// Never panics on pipeline failure: the outcome, including the failing
    /// stage and error kind, is reported in the returned [`ProductionResult`].
    pub async fn produce_episode(&self, request: EpisodeRequest) -> ProductionResult {
        self.produce_episode_with(request, CancellationToken::new(), ProgressSender::noop())
            .await
    }

    /// Produce one episode with cancellation (honoured between stages) and
    /// progress reporting.
    pub async fn produce_episode_with(
        &self,
        request: EpisodeRequest,
        cancellation: CancellationToken,
        progress: ProgressSender,
    ) -> ProductionResult {
        let request = Arc::new(request);
        let run_id = RunId::new();
        let started = Instant::now();
        let started_at = Utc::now();
        let mut state = RunState::Pending;

        tracing::info!(
            run_id = %run_id,
            show = %request.show_title,
            episode = %request.episode_code(),
            scenes = request.scenes.len(),
            "Producing episode"
        );

        let prepare_started = Instant::now();
        let prepared = state
            .advance(RunState::Running(StageId::Prepare))
            .and_then(|()| self.prepare(&request, run_id));
        let prepare_timing = StageTiming {
            stage: StageId::Prepare,
            elapsed: prepare_started.elapsed(),
        };

        let (plan, artifacts) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!(run_id = %run_id, stage = %StageId::Prepare, "Preparation failed: {e}");
                let _ = state.advance(RunState::Failed);
                return ProductionResult {
                    run_id,
                    status: ProductionStatus::Failed,
                    started_at,
                    finished_at: Utc::now(),
                    output: None,
                    episode_duration: None,
                    elapsed: started.elapsed(),
                    stage_timings: vec![prepare_timing],
                    failure: Some(StageFailure::new(StageId::Prepare, &e)),
                    warnings: Vec::new(),
                };
            }
        };

        let StagePlan {
            stages,
            intermediate,
            delivery,
            ..
        } = plan;
        let ctx = StageContext::new(
            artifacts.clone(),
            self.collaborators.clone(),
            intermediate,
            delivery,
        )
        .with_cancellation(cancellation)
        .with_progress(progress);

        let executor = PipelineExecutor::new(
            stages,
            Duration::from_secs(self.config.pipeline.stage_timeout_secs),
        );
        let report = executor.execute(&ctx, &request.output, state).await;

        // The one and only release of this run's artifacts, on every path.
        let warnings = artifacts.release_all();

        let mut stage_timings = vec![prepare_timing];
        stage_timings.extend(report.timings);

        let result = match report.outcome {
            Ok(published) => ProductionResult {
                run_id,
                status: ProductionStatus::Succeeded,
                started_at,
                finished_at: Utc::now(),
                output: Some(published.output),
                episode_duration: published.media.and_then(|m| m.duration),
                elapsed: started.elapsed(),
                stage_timings,
                failure: None,
                warnings,
            },
            Err(e) => ProductionResult {
                run_id,
                status: ProductionStatus::Failed,
                started_at,
                finished_at: Utc::now(),
                output: None,
                episode_duration: None,
                elapsed: started.elapsed(),
                stage_timings,
                failure: Some(StageFailure::new(e.stage, &e.error)),
                warnings,
            },
        };

        match &result.failure {
            None => tracing::info!(
                run_id = %run_id,
                elapsed_ms = result.elapsed.as_millis() as u64,
                warnings = result.warnings.len(),
                "Episode {} produced",
                request.episode_code()
            ),
            Some(failure) => tracing::warn!(run_id = %run_id, "Episode failed: {failure}"),
        }

        result
    }

    fn prepare(
        &self,
        request: &EpisodeRequest,
        run_id: RunId,
    ) -> ef_core::Result<(StagePlan, Arc<ArtifactManager>)> {
        let plan = self.plan(request)?;
        tracing::debug!(run_id = %run_id, plan = ?plan, "Stage plan ready");
        let working_dir = self.config.pipeline.working_dir();
        let artifacts = Arc::new(ArtifactManager::new(&working_dir, run_id)?);
        Ok((plan, artifacts))
    }
}
