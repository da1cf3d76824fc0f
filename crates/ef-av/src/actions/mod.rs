//! ffmpeg invocations behind [`FfmpegEncoder`](crate::FfmpegEncoder) and
//! [`FfmpegRenderer`](crate::FfmpegRenderer).
//!
//! Each operation is split into a pure `*_args` builder, unit-tested without
//! ffmpeg, and an async runner that executes it.

mod card;
mod codec;
mod compose;
mod concat;
mod export;
mod grade;
mod transition;

pub use card::{card_args, escape_drawtext, is_valid_color, render_card};
pub use codec::{audio_encoder, encode_args, format_rate, muxer, video_encoder};
pub use compose::{compose_scene, compose_scene_args};
pub use concat::{concat, concat_args};
pub use export::{export, export_args};
pub use grade::{grade, grade_args, grade_filter};
pub use transition::{transition, transition_args};

use std::path::Path;

use crate::tools::ToolRegistry;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// `scale`+`pad` to fit `WxH` without distortion, then square pixels.
fn fit_filter(target: &crate::EncodeTarget) -> String {
    let w = target.resolution.width;
    let h = target.resolution.height;
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1"
    )
}

async fn run_ffmpeg(tools: &ToolRegistry, args: Vec<String>) -> ef_core::Result<()> {
    let mut cmd = tools.command("ffmpeg")?;
    cmd.args(["-hide_banner", "-nostdin", "-y"]);
    cmd.args(args);
    cmd.execute().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_target() -> crate::EncodeTarget {
    crate::EncodeTarget {
        resolution: ef_core::Resolution::FULL_HD,
        frame_rate: 30.0,
        video_codec: ef_core::VideoCodec::H264,
        crf: 18,
        speed: "veryfast".into(),
        max_bitrate: None,
        audio_codec: ef_core::AudioCodec::Pcm,
        audio_bitrate: "192k".into(),
        sample_rate: 48000,
        container: ef_core::Container::Mkv,
    }
}
