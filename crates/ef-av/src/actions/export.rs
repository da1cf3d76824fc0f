//! Final delivery transcode.

use std::path::Path;

use ef_core::Container;

use super::{codec, fit_filter, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::tools::ToolRegistry;

/// Arguments transcoding `input` to the delivery `target`.
pub fn export_args(input: &Path, output: &Path, target: &EncodeTarget) -> Vec<String> {
    let vf = format!(
        "{},fps={}",
        fit_filter(target),
        codec::format_rate(target.frame_rate)
    );
    let mut args = vec![
        "-i".to_string(),
        path_arg(input),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "0:a:0".to_string(),
        "-vf".to_string(),
        vf,
    ];
    args.extend(codec::encode_args(target));
    if matches!(target.container, Container::Mp4 | Container::Mov) {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args.push(path_arg(output));
    args
}

/// Export with ffmpeg.
pub async fn export(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    tracing::debug!(
        container = %target.container,
        video = %target.video_codec,
        audio = %target.audio_codec,
        "export"
    );
    run_ffmpeg(tools, export_args(input, output, target)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_target;
    use ef_core::{AudioCodec, VideoCodec};

    #[test]
    fn mp4_export_is_faststart() {
        let mut target = test_target();
        target.container = Container::Mp4;
        target.audio_codec = AudioCodec::Aac;
        let joined = export_args(Path::new("in.mkv"), Path::new("out.mp4"), &target).join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-f mp4"));
        assert!(joined.contains("-movflags +faststart"));
    }

    #[test]
    fn matroska_export_has_no_movflags() {
        let mut target = test_target();
        target.video_codec = VideoCodec::H265;
        target.audio_codec = AudioCodec::Flac;
        let args = export_args(Path::new("in.mkv"), Path::new("out.mkv"), &target);
        assert!(!args.iter().any(|a| a == "-movflags"));
        assert!(args.iter().any(|a| a == "libx265"));
    }
}
