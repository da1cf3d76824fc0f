//! Scene composition: mux an animation with its narration audio.

use std::path::Path;

use super::{codec, fit_filter, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// Arguments muxing `animation`'s video with `audio`, fitted to the target
/// geometry. The clip ends with the shorter of the two inputs.
pub fn compose_scene_args(
    animation: &Path,
    audio: &Path,
    output: &Path,
    target: &EncodeTarget,
) -> Vec<String> {
    let vf = format!(
        "{},fps={}",
        fit_filter(target),
        codec::format_rate(target.frame_rate)
    );

    let mut args: Vec<String> = vec![
        "-i".into(),
        path_arg(animation),
        "-i".into(),
        path_arg(audio),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-vf".into(),
        vf,
        "-shortest".into(),
    ];
    args.extend(codec::encode_args(target));
    args.push(path_arg(output));
    args
}

/// Compose one scene with ffmpeg.
pub async fn compose_scene(
    tools: &ToolRegistry,
    animation: &Path,
    audio: &Path,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    tracing::debug!(
        animation = %animation.display(),
        audio = %audio.display(),
        "compose scene"
    );
    run_ffmpeg(tools, compose_scene_args(animation, audio, output, target)).await
}
