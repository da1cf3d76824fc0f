//! Stage factory: turn a request into the ordered list of stages to run.

use ef_av::EncodeTarget;
use ef_core::config::PipelineConfig;
use ef_core::PresetCatalog;

use crate::request::EpisodeRequest;
use crate::stage::{Stage, StageId};
use crate::stages::{
    AssembleStage, ComposeSceneStage, CreditsStage, ExportStage, GradeStage, TitleCardStage,
    ValidateStage,
};

/// A fully resolved production plan.
pub struct StagePlan {
    /// Stages in execution order.
    pub stages: Vec<Box<dyn Stage>>,
    /// Resolved quality preset name.
    pub quality: String,
    /// Resolved compliance profile name.
    pub profile: String,
    pub intermediate: EncodeTarget,
    pub delivery: EncodeTarget,
    /// Transition calls the assemble stage will make.
    pub transitions: usize,
}

impl StagePlan {
    /// Stage ids in execution order.
    pub fn ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }
}

impl std::fmt::Debug for StagePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePlan")
            .field("stages", &self.ids())
            .field("quality", &self.quality)
            .field("profile", &self.profile)
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

/// Build the stage list for `request`.
///
/// Every preset, profile, transition and grade name is resolved here, so an
/// unknown name fails before any work begins.
///
/// # Errors
///
/// Returns [`ef_core::Error::Validation`] for a malformed request or an
/// unknown catalog name.
pub fn build_stages(
    request: &EpisodeRequest,
    catalog: &PresetCatalog,
    pipeline: &PipelineConfig,
) -> ef_core::Result<StagePlan> {
    request.validate()?;

    let quality = request
        .quality
        .clone()
        .unwrap_or_else(|| pipeline.default_quality.clone());
    let profile_name = request
        .profile
        .clone()
        .unwrap_or_else(|| pipeline.default_profile.clone());
    let preset = catalog.quality(&quality)?;
    let profile = catalog.profile(&profile_name)?;

    // junctions[i] joins scene i+1 to scene i+2.
    let junctions = request
        .scenes
        .iter()
        .skip(1)
        .map(|scene| {
            match scene.transition.as_deref().or(request.transition.as_deref()) {
                Some(name) => catalog.transition(name),
                None => Ok(None),
            }
        })
        .collect::<ef_core::Result<Vec<_>>>()?;
    if let Some(name) = request.scenes[0].transition.as_deref() {
        // Validate the name even though the title card always cuts in.
        catalog.transition(name)?;
        tracing::debug!(transition = name, "ignoring transition into the first scene");
    }

    let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(request.scenes.len() + 6);
    stages.push(Box::new(TitleCardStage::new(request.title_card_spec())));
    for (i, scene) in request.scenes.iter().enumerate() {
        stages.push(Box::new(ComposeSceneStage::new(i + 1, scene.clone())));
    }

    let assemble = AssembleStage::new(request.scenes.len(), junctions);
    let transitions = assemble.transition_count();
    stages.push(Box::new(assemble));

    let body = match request.grade.as_deref() {
        Some(name) => {
            let grade = catalog.grade(name)?;
            grade.validate()?;
            stages.push(Box::new(GradeStage::new(name, *grade)));
            StageId::Grade
        }
        None => StageId::Assemble,
    };

    stages.push(Box::new(CreditsStage::new(request.credits_spec(), body)));
    stages.push(Box::new(ExportStage::new()));
    stages.push(Box::new(ValidateStage::new(&profile_name, profile.clone())));

    Ok(StagePlan {
        stages,
        intermediate: EncodeTarget::intermediate(preset, pipeline.intermediate_crf),
        delivery: EncodeTarget::from_preset(preset, profile),
        quality,
        profile: profile_name,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SceneDescriptor;
    use ef_core::ErrorKind;

    fn request(scenes: usize) -> EpisodeRequest {
        EpisodeRequest {
            show_title: "Show".into(),
            episode_title: "Pilot".into(),
            episode_number: 1,
            season_number: 1,
            scenes: (1..=scenes)
                .map(|i| SceneDescriptor::new(format!("/in/{i}.mov"), format!("/in/{i}.wav")))
                .collect(),
            title_card: Default::default(),
            credits: Default::default(),
            output: "/out/e.mp4".into(),
            quality: None,
            profile: None,
            transition: None,
            grade: None,
        }
    }

    fn plan(req: &EpisodeRequest) -> ef_core::Result<StagePlan> {
        build_stages(req, PresetCatalog::builtin(), &PipelineConfig::default())
    }

    #[test]
    fn fixed_stage_order() {
        let plan = plan(&request(3)).unwrap();
        assert_eq!(
            plan.ids(),
            vec![
                StageId::TitleCard,
                StageId::ComposeScene { scene: 1 },
                StageId::ComposeScene { scene: 2 },
                StageId::ComposeScene { scene: 3 },
                StageId::Assemble,
                StageId::Credits,
                StageId::Export,
                StageId::Validate,
            ]
        );
        assert_eq!(plan.quality, "standard");
        assert_eq!(plan.profile, "youtube");
        assert_eq!(plan.transitions, 0);
    }

    #[test]
    fn grade_inserted_after_assemble() {
        let mut req = request(1);
        req.grade = Some("warm".into());
        let ids = plan(&req).unwrap().ids();
        let assemble = ids.iter().position(|s| *s == StageId::Assemble).unwrap();
        assert_eq!(ids[assemble + 1], StageId::Grade);
        assert_eq!(ids[assemble + 2], StageId::Credits);
    }

    #[test]
    fn default_transition_with_per_scene_cut() {
        let mut req = request(4);
        req.transition = Some("dissolve".into());
        req.scenes[2].transition = Some("cut".into());
        assert_eq!(plan(&req).unwrap().transitions, 2);

        req.scenes[2].transition = None;
        assert_eq!(plan(&req).unwrap().transitions, 3);
    }

    #[test]
    fn unknown_names_fail_before_work() {
        for mutate in [
            (|r: &mut EpisodeRequest| r.quality = Some("ultra".into())) as fn(&mut EpisodeRequest),
            |r| r.profile = Some("tiktok".into()),
            |r| r.transition = Some("spin".into()),
            |r| r.grade = Some("noir".into()),
            |r| r.scenes[0].transition = Some("spin".into()),
        ] {
            let mut req = request(2);
            mutate(&mut req);
            let err = plan(&req).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{err}");
        }
    }

    #[test]
    fn targets_follow_preset_and_profile() {
        let mut req = request(1);
        req.quality = Some("draft".into());
        req.profile = Some("archive".into());
        let plan = plan(&req).unwrap();
        assert_eq!(plan.delivery.resolution, ef_core::Resolution::HD);
        assert_eq!(plan.delivery.container, ef_core::Container::Mkv);
        assert_eq!(plan.intermediate.crf, PipelineConfig::default().intermediate_crf);
    }
}
