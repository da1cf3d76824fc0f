//! ef-core: shared types, IDs, errors, configuration, and the preset catalog.
//!
//! This crate is the foundational dependency for all other ef-* crates,
//! providing a unified error type with stable error kinds, typed run
//! identifiers, media-domain enums, application configuration, and the
//! read-only catalog of quality presets, compliance profiles, transitions and
//! colour grades.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod presets;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use media::*;
pub use presets::{
    ColorGrade, ComplianceProfile, PresetCatalog, QualityPreset, TransitionKind, TransitionSpec,
};
