//! Colour grading with the `eq` and `vignette` filters.

use std::path::Path;

use ef_core::ColorGrade;

use super::{codec, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// Filter chain for a grade.
pub fn grade_filter(grade: &ColorGrade) -> String {
    let mut filter = format!(
        "eq=brightness={:.3}:contrast={:.3}:saturation={:.3}:gamma={:.3}",
        grade.brightness, grade.contrast, grade.saturation, grade.gamma
    );
    if grade.vignette {
        filter.push_str(",vignette=PI/5");
    }
    filter
}

/// Arguments grading the video of `input`. Audio passes through untouched.
pub fn grade_args(
    input: &Path,
    grade: &ColorGrade,
    output: &Path,
    target: &EncodeTarget,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(input),
        "-vf".to_string(),
        grade_filter(grade),
    ];
    args.extend(codec::encode_args(target));
    // Later options win, so this overrides the audio encoder from the target.
    args.extend(["-c:a".to_string(), "copy".to_string()]);
    args.push(path_arg(output));
    args
}

/// Apply a grade with ffmpeg.
pub async fn grade(
    tools: &ToolRegistry,
    input: &Path,
    grade: &ColorGrade,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    tracing::debug!(filter = %grade_filter(grade), "grade");
    run_ffmpeg(tools, grade_args(input, grade, output, target)).await
}
