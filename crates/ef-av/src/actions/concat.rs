//! Hard-cut concatenation of clips.

use std::path::{Path, PathBuf};

use super::{codec, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// Arguments joining `inputs` in order with the `concat` filter.
///
/// The filter (rather than the concat demuxer) tolerates inputs whose
/// encoder settings differ, e.g. a rendered card next to a composed scene.
pub fn concat_args(inputs: &[PathBuf], output: &Path, target: &EncodeTarget) -> Vec<String> {
    let mut args = Vec::with_capacity(inputs.len() * 2 + 24);
    for input in inputs {
        args.push("-i".to_string());
        args.push(path_arg(input));
    }

    let pads: String = (0..inputs.len()).map(|i| format!("[{i}:v][{i}:a]")).collect();
    let filter = format!("{pads}concat=n={}:v=1:a=1[v][a]", inputs.len());

    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
    ]);
    args.extend(codec::encode_args(target));
    args.push(path_arg(output));
    args
}

/// Concatenate clips with ffmpeg.
pub async fn concat(
    tools: &ToolRegistry,
    inputs: &[PathBuf],
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    if inputs.is_empty() {
        return Err(ef_core::Error::Internal("concat called with no inputs".into()));
    }
    tracing::debug!(clips = inputs.len(), "concat");
    run_ffmpeg(tools, concat_args(inputs, output, target)).await
}
