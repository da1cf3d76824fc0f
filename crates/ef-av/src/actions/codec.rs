//! Mapping from episodeforge codecs and targets to ffmpeg encoder options.

use ef_core::{AudioCodec, Container, VideoCodec};

use crate::encoder::EncodeTarget;

/// ffmpeg encoder for a video codec.
pub fn video_encoder(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H264 => "libx264",
        VideoCodec::H265 => "libx265",
        VideoCodec::Vp9 => "libvpx-vp9",
        VideoCodec::Av1 => "libsvtav1",
        VideoCodec::Prores => "prores_ks",
    }
}

/// ffmpeg encoder for an audio codec.
pub fn audio_encoder(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Aac => "aac",
        AudioCodec::Opus => "libopus",
        AudioCodec::Mp3 => "libmp3lame",
        AudioCodec::Flac => "flac",
        AudioCodec::Pcm => "pcm_s16le",
    }
}

/// ffmpeg muxer name, so output paths need not carry an extension.
pub fn muxer(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "mp4",
        Container::Mkv => "matroska",
        Container::Mov => "mov",
        Container::Webm => "webm",
    }
}

/// Frame rate as ffmpeg expects it; NTSC rates become exact fractions.
pub fn format_rate(fps: f64) -> String {
    const NTSC: &[(f64, &str)] = &[
        (23.976, "24000/1001"),
        (29.97, "30000/1001"),
        (59.94, "60000/1001"),
    ];
    if let Some((_, exact)) = NTSC.iter().find(|(r, _)| (fps - r).abs() < 0.01) {
        return (*exact).to_string();
    }
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as u64)
    } else {
        format!("{fps:.3}")
    }
}

/// SVT-AV1 and libvpx take numeric speed levels instead of x264 names.
fn numeric_speed(speed: &str) -> u32 {
    match speed {
        "ultrafast" | "superfast" => 10,
        "veryfast" => 8,
        "faster" | "fast" => 6,
        "medium" => 5,
        "slow" => 4,
        "slower" => 3,
        "veryslow" | "placebo" => 2,
        other => other.parse().unwrap_or(5),
    }
}

/// Video and audio encoder options for `target`, plus the output muxer.
pub fn encode_args(target: &EncodeTarget) -> Vec<String> {
    let mut args: Vec<String> = vec!["-c:v".into(), video_encoder(target.video_codec).into()];

    match target.video_codec {
        VideoCodec::H264 | VideoCodec::H265 => {
            args.extend([
                "-preset".into(),
                target.speed.clone(),
                "-crf".into(),
                target.crf.to_string(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
        }
        VideoCodec::Vp9 => {
            // Constant quality mode needs an explicit zero bitrate.
            args.extend([
                "-deadline".into(),
                "good".into(),
                "-cpu-used".into(),
                numeric_speed(&target.speed).min(5).to_string(),
                "-crf".into(),
                target.crf.to_string(),
                "-b:v".into(),
                "0".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
        }
        VideoCodec::Av1 => {
            args.extend([
                "-preset".into(),
                numeric_speed(&target.speed).to_string(),
                "-crf".into(),
                target.crf.to_string(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
        }
        VideoCodec::Prores => {
            args.extend([
                "-profile:v".into(),
                "3".into(),
                "-pix_fmt".into(),
                "yuv422p10le".into(),
            ]);
        }
    }

    if let Some(max) = &target.max_bitrate {
        args.extend([
            "-maxrate".into(),
            max.clone(),
            "-bufsize".into(),
            max.clone(),
        ]);
    }

    args.extend([
        "-c:a".into(),
        audio_encoder(target.audio_codec).into(),
    ]);
    if !matches!(target.audio_codec, AudioCodec::Flac | AudioCodec::Pcm) {
        args.extend(["-b:a".into(), target.audio_bitrate.clone()]);
    }
    args.extend([
        "-ar".into(),
        target.sample_rate.to_string(),
        "-ac".into(),
        "2".into(),
        "-f".into(),
        muxer(target.container).into(),
    ]);

    args
}
