//! Compliance validation of the exported episode.

use async_trait::async_trait;
use ef_core::ComplianceProfile;

use crate::compliance::check_compliance;
use crate::context::StageContext;
use crate::stage::{Stage, StageId, StageInputs, StageOutput};

/// Probe the export and reject it if it violates the compliance profile.
///
/// Passes the export artifact through unchanged.
#[derive(Debug)]
pub struct ValidateStage {
    profile_name: String,
    profile: ComplianceProfile,
}

impl ValidateStage {
    pub fn new(profile_name: impl Into<String>, profile: ComplianceProfile) -> Self {
        Self {
            profile_name: profile_name.into(),
            profile,
        }
    }
}

#[async_trait]
impl Stage for ValidateStage {
    fn id(&self) -> StageId {
        StageId::Validate
    }

    fn inputs(&self) -> Vec<StageId> {
        vec![StageId::Export]
    }

    async fn validate(&self, ctx: &StageContext) -> ef_core::Result<()> {
        // Only a hint: the probe of the real export is authoritative.
        let target = &ctx.delivery;
        if !self.profile.resolutions.is_empty()
            && !self.profile.resolutions.contains(&target.resolution)
        {
            tracing::warn!(
                profile = %self.profile_name,
                resolution = %target.resolution,
                "delivery resolution is not allowed by the compliance profile"
            );
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        inputs: &StageInputs,
    ) -> ef_core::Result<StageOutput> {
        let export = inputs.get(StageId::Export)?;
        let mut info = ctx.prober().probe(export.path()).await?;
        if info.file_size == 0 {
            info.file_size = std::fs::metadata(export.path())?.len();
        }

        let violations = check_compliance(&info, &self.profile);
        if !violations.is_empty() {
            return Err(ef_core::Error::ComplianceViolation {
                violations: violations.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(StageOutput {
            artifact: export.clone(),
            summary: format!("complies with '{}'", self.profile_name),
            media: Some(info),
        })
    }
}
