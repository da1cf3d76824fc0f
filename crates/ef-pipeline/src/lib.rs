//! # ef-pipeline
//!
//! Orchestration of episode production.
//!
//! This crate provides:
//!
//! - **[`EpisodeRequest`]** -- what to produce: titles, scenes, cards, output.
//! - **[`Stage`]** trait -- a single pipeline step with validate / execute
//!   semantics that consumes earlier stages' artifacts.
//! - **[`StageContext`]** -- shared execution context (artifact manager,
//!   collaborators, encode targets, cancellation, progress).
//! - **Built-in stages** ([`stages`]) -- title card, scene composition,
//!   assembly with transitions, grading, credits, export, compliance
//!   validation.
//! - **[`build_stages`]** -- factory resolving a request into a stage plan.
//! - **[`PipelineExecutor`]** -- runs stages strictly in order, fail-fast,
//!   with per-stage timeouts and cancellation between stages.
//! - **[`EpisodeProducer`]** -- `produce_episode`, owning the artifact
//!   lifecycle of each run and reporting a [`ProductionResult`].

pub mod compliance;
pub mod context;
pub mod executor;
pub mod factory;
pub mod producer;
pub mod request;
pub mod result;
pub mod stage;
pub mod stages;
pub mod state;

// Re-export key types at the crate root.
pub use compliance::{check_compliance, Violation};
pub use context::{Collaborators, ProgressSender, StageContext};
pub use executor::{ExecutionReport, PipelineExecutor, Published, StageError};
pub use factory::{build_stages, StagePlan};
pub use producer::EpisodeProducer;
pub use request::{CreditsConfig, EpisodeRequest, SceneDescriptor, TitleCardConfig};
pub use result::{ProductionResult, ProductionStatus, StageFailure, StageTiming};
pub use stage::{Stage, StageId, StageInputs, StageOutput};
pub use state::RunState;
