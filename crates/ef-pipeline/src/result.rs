//! The outcome of one production run.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ef_av::CleanupWarning;
use ef_core::{ErrorKind, RunId};
use serde::{Serialize, Serializer};

use crate::stage::StageId;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStatus {
    Succeeded,
    Failed,
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => f.write_str("SUCCEEDED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// How long one stage took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: StageId,
    #[serde(serialize_with = "secs")]
    pub elapsed: Duration,
}

/// The stage that ended a failed run and why.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{kind} at stage {stage}: {message}")]
pub struct StageFailure {
    pub stage: StageId,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: StageId, error: &ef_core::Error) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything a caller learns about a run.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionResult {
    pub run_id: RunId,
    pub status: ProductionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// The published episode; set only on success.
    pub output: Option<PathBuf>,
    /// Probed duration of the published episode.
    #[serde(serialize_with = "opt_secs")]
    pub episode_duration: Option<Duration>,
    /// Wall-clock time of the whole run.
    #[serde(serialize_with = "secs")]
    pub elapsed: Duration,
    pub stage_timings: Vec<StageTiming>,
    pub failure: Option<StageFailure>,
    /// Non-fatal cleanup problems. Never change `status`.
    pub warnings: Vec<CleanupWarning>,
}

impl ProductionResult {
    pub fn is_success(&self) -> bool {
        self.status == ProductionStatus::Succeeded
    }

    /// `Ok(self)` on success, the failure otherwise.
    pub fn into_result(self) -> Result<Self, StageFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }

    /// Timing recorded for `stage`, if it ran.
    pub fn timing(&self, stage: StageId) -> Option<Duration> {
        self.stage_timings
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.elapsed)
    }
}

fn secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn opt_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}
