//! Built-in stage implementations.
//!
//! Each module wraps one collaborator call (or, for assembly, a sequence of
//! them) and exposes it as a pipeline [`Stage`](crate::stage::Stage).

mod assemble;
mod compose;
mod credits;
mod export;
mod grade;
mod title_card;
mod validate;

pub use assemble::AssembleStage;
pub use compose::ComposeSceneStage;
pub use credits::CreditsStage;
pub use export::ExportStage;
pub use grade::GradeStage;
pub use title_card::TitleCardStage;
pub use validate::ValidateStage;
