//! # ef-av
//!
//! External tool management, artifact lifecycle, probing, and the ffmpeg-backed
//! stage collaborators for the episodeforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Artifact lifecycle** ([`ArtifactManager`]) -- run-private namespace of
//!   temporary artifacts with tracked acquisition and idempotent release.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- container, codec,
//!   resolution and duration of a produced artifact.
//! - **Collaborators** ([`Encoder`], [`ImageRenderer`]) -- the opaque
//!   encode/render operations the pipeline delegates to, with
//!   [`FfmpegEncoder`] and [`FfmpegRenderer`] implementations built on the
//!   [`actions`] functions.

pub mod actions;
pub mod artifacts;
pub mod command;
pub mod encoder;
pub mod probe;
pub mod render;
pub mod tools;

// ---- Re-exports for convenience ----

pub use artifacts::{ArtifactHandle, ArtifactManager, CleanupWarning};
pub use command::{ToolCommand, ToolOutput};
pub use encoder::{EncodeTarget, Encoder, FfmpegEncoder};
pub use probe::{AudioStream, FfprobeProber, MediaInfo, Prober, VideoStream};
pub use render::{CardLine, CardSpec, FfmpegRenderer, ImageRenderer};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
