//! Run state machine.
//!
//! ```text
//! PENDING -> RUNNING(stage_i) -> { RUNNING(stage_i+1) | FAILED | SUCCEEDED }
//! ```
//!
//! `SUCCEEDED` and `FAILED` are terminal.

use std::fmt;

use serde::Serialize;

use crate::stage::StageId;

/// Where a production run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state", content = "stage")]
pub enum RunState {
    Pending,
    Running(StageId),
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    ///
    /// A run may fail from any non-terminal state, including before its first
    /// stage starts, but only succeeds from a running stage.
    pub fn advance(&mut self, next: RunState) -> ef_core::Result<()> {
        let legal = match (*self, next) {
            (Self::Pending, Self::Running(_)) => true,
            (Self::Running(current), Self::Running(stage)) => current != stage,
            (Self::Running(_), Self::Succeeded) => true,
            (Self::Pending | Self::Running(_), Self::Failed) => true,
            _ => false,
        };
        if !legal {
            return Err(ef_core::Error::Internal(format!(
                "illegal run state transition {self} -> {next}"
            )));
        }
        tracing::trace!(from = %self, to = %next, "run state");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Running(stage) => write!(f, "RUNNING({stage})"),
            Self::Succeeded => f.write_str("SUCCEEDED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}
