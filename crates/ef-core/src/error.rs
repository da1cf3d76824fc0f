//! Unified error type for episodeforge.
//!
//! All crates funnel their failures into [`Error`]. Every variant maps onto a
//! coarse [`ErrorKind`] via [`Error::kind`], which is what a production result
//! reports to the caller.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure, reported alongside the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced animation, audio or image file does not exist or is empty.
    MissingInputArtifact,
    /// An external collaborator returned non-success (or timed out).
    StageExecutionFailure,
    /// The final artifact does not satisfy the compliance profile.
    ComplianceViolation,
    /// A temporary artifact could not be removed. Never fatal.
    ArtifactCleanupFailure,
    /// The request or configuration is malformed.
    InvalidRequest,
    /// The run was cancelled at a stage boundary.
    Cancelled,
    /// Unexpected internal failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingInputArtifact => "MissingInputArtifact",
            Self::StageExecutionFailure => "StageExecutionFailure",
            Self::ComplianceViolation => "ComplianceViolation",
            Self::ArtifactCleanupFailure => "ArtifactCleanupFailure",
            Self::InvalidRequest => "InvalidRequest",
            Self::Cancelled => "Cancelled",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// Unified error type covering all failure modes in episodeforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input artifact is absent or empty when its stage runs.
    #[error("Missing input artifact {}: {reason}", path.display())]
    MissingInputArtifact {
        /// Path that was expected to exist.
        path: PathBuf,
        /// Why it was rejected ("does not exist", "is empty", ...).
        reason: String,
    },

    /// A stage failed for a reason other than a tool error.
    #[error("Stage error [{stage}]: {message}")]
    StageExecution {
        /// Name of the stage that failed.
        stage: String,
        /// Human-readable error description.
        message: String,
    },

    /// The exported artifact violates its compliance profile.
    #[error("Compliance violation: {}", violations.join("; "))]
    ComplianceViolation {
        /// One entry per violated constraint.
        violations: Vec<String>,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The run was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingInputArtifact { .. } => ErrorKind::MissingInputArtifact,
            Error::StageExecution { .. } => ErrorKind::StageExecutionFailure,
            Error::Tool { .. } => ErrorKind::StageExecutionFailure,
            Error::Probe(_) => ErrorKind::StageExecutionFailure,
            Error::Io { .. } => ErrorKind::StageExecutionFailure,
            Error::ComplianceViolation { .. } => ErrorKind::ComplianceViolation,
            Error::Validation(_) => ErrorKind::InvalidRequest,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Process exit code the CLI uses for this error.
    pub fn exit_code(&self) -> i32 {
        exit_code_for(self.kind())
    }

    /// Convenience constructor for [`Error::MissingInputArtifact`].
    pub fn missing_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MissingInputArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::StageExecution`].
    pub fn stage(stage: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::StageExecution {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Exit code for a given error kind.
pub fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidRequest => 2,
        ErrorKind::MissingInputArtifact => 3,
        ErrorKind::StageExecutionFailure => 4,
        ErrorKind::ComplianceViolation => 5,
        ErrorKind::Cancelled => 130,
        ErrorKind::ArtifactCleanupFailure | ErrorKind::Internal => 1,
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
