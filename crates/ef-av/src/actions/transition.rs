//! Transitions between adjacent clips via `xfade` and `acrossfade`.

use std::path::Path;
use std::time::Duration;

use ef_core::TransitionSpec;

use super::{codec, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// Arguments blending the tail of `first` into the head of `second`.
///
/// The transition starts `spec.duration_secs` before the end of `first`, so
/// the output is that much shorter than the two clips combined.
///
/// # Errors
///
/// Fails when `first` is not longer than the transition itself.
pub fn transition_args(
    first: &Path,
    first_duration: Duration,
    second: &Path,
    spec: &TransitionSpec,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<Vec<String>> {
    let d = spec.duration_secs;
    let offset = first_duration.as_secs_f64() - d;
    if offset <= 0.0 {
        return Err(ef_core::Error::tool(
            "ffmpeg",
            format!(
                "{} is {:.3}s long, too short for a {d:.3}s {} transition",
                first.display(),
                first_duration.as_secs_f64(),
                spec.kind.xfade_name()
            ),
        ));
    }

    let filter = format!(
        "[0:v][1:v]xfade=transition={}:duration={d:.3}:offset={offset:.3},format=yuv420p[v];\
         [0:a][1:a]acrossfade=d={d:.3}[a]",
        spec.kind.xfade_name()
    );

    let mut args = vec![
        "-i".to_string(),
        path_arg(first),
        "-i".to_string(),
        path_arg(second),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
    ];
    args.extend(codec::encode_args(target));
    args.push(path_arg(output));
    Ok(args)
}

/// Join two clips with a transition using ffmpeg.
pub async fn transition(
    tools: &ToolRegistry,
    first: &Path,
    first_duration: Duration,
    second: &Path,
    spec: &TransitionSpec,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    let args = transition_args(first, first_duration, second, spec, output, target)?;
    tracing::debug!(kind = spec.kind.xfade_name(), duration = spec.duration_secs, "transition");
    run_ffmpeg(tools, args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_target;
    use ef_core::TransitionKind;

    fn dissolve() -> TransitionSpec {
        TransitionSpec {
            kind: TransitionKind::Dissolve,
            duration_secs: 1.0,
        }
    }

    #[test]
    fn offset_is_first_duration_minus_transition() {
        let args = transition_args(
            Path::new("a.mkv"),
            Duration::from_secs_f64(12.5),
            Path::new("b.mkv"),
            &dissolve(),
            Path::new("o.mkv"),
            &test_target(),
        )
        .unwrap();
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("xfade=transition=dissolve:duration=1.000:offset=11.500"));
        assert!(filter.contains("acrossfade=d=1.000"));
    }

    #[test]
    fn clip_shorter_than_transition_is_rejected() {
        let err = transition_args(
            Path::new("a.mkv"),
            Duration::from_millis(800),
            Path::new("b.mkv"),
            &dissolve(),
            Path::new("o.mkv"),
            &test_target(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}
