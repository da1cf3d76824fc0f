//! Text cards rendered from `lavfi` sources.

use std::path::Path;

use super::{codec, path_arg, run_ffmpeg};
use crate::encoder::EncodeTarget;
use crate::render::CardSpec;
use crate::tools::ToolRegistry;

/// Line spacing as a multiple of the font size.
const LINE_SPACING: f64 = 1.4;

/// Escape text for a `drawtext` `text=` value inside a filtergraph.
///
/// Two levels apply: the option parser (`\ ' :`) and then the filtergraph
/// parser (`\ ' [ ] , ;`).
pub fn escape_drawtext(text: &str) -> String {
    fn escape(s: &str, specials: &[char]) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if specials.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
    let option_level = escape(text, &['\\', '\'', ':']);
    escape(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

/// Whether `color` is a plain colour name (`black`, `DarkSlateBlue`) or a
/// `#RRGGBB` / `#RRGGBBAA` hex value.
///
/// Anything else could carry extra filter options into the graph.
pub fn is_valid_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !color.is_empty() && color.chars().all(|c| c.is_ascii_alphabetic()),
    }
}

fn card_filter(card: &CardSpec, target: &EncodeTarget) -> String {
    let height = target.resolution.height as f64;
    let sizes: Vec<f64> = card
        .lines
        .iter()
        .map(|l| (l.size as f64 * height / 1080.0).round().max(1.0))
        .collect();
    let block: f64 = sizes.iter().map(|s| s * LINE_SPACING).sum();
    let mut y = (height - block) / 2.0;

    let mut filters: Vec<String> = Vec::new();
    for (line, size) in card.lines.iter().zip(&sizes) {
        filters.push(format!(
            "drawtext=expansion=none:text={}:fontcolor={}:fontsize={}:x=(w-text_w)/2:y={}",
            escape_drawtext(&line.text),
            card.foreground,
            *size as u32,
            y.round() as i64
        ));
        y += size * LINE_SPACING;
    }

    let total = card.duration.as_secs_f64();
    let fade = card.fade.as_secs_f64().min(total / 2.0);
    if fade > 0.0 {
        filters.push(format!("fade=t=in:st=0:d={fade:.3}"));
        filters.push(format!("fade=t=out:st={:.3}:d={fade:.3}", total - fade));
    }
    filters.push("format=yuv420p".to_string());
    filters.join(",")
}

/// Arguments rendering `card` to a clip matching `target`, with a silent
/// stereo track.
pub fn card_args(card: &CardSpec, output: &Path, target: &EncodeTarget) -> Vec<String> {
    let duration = format!("{:.3}", card.duration.as_secs_f64());
    let color = format!(
        "color=c={}:s={}:r={}:d={duration}",
        card.background,
        target.resolution,
        codec::format_rate(target.frame_rate)
    );
    let silence = format!(
        "anullsrc=channel_layout=stereo:sample_rate={}",
        target.sample_rate
    );

    let mut args = vec![
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        color,
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        silence,
        "-vf".to_string(),
        card_filter(card, target),
        "-t".to_string(),
        duration,
    ];
    args.extend(codec::encode_args(target));
    args.push(path_arg(output));
    args
}

/// Render a card with ffmpeg.
pub async fn render_card(
    tools: &ToolRegistry,
    card: &CardSpec,
    output: &Path,
    target: &EncodeTarget,
) -> ef_core::Result<()> {
    if card.duration.is_zero() {
        return Err(ef_core::Error::Validation("card duration must be positive".into()));
    }
    for color in [&card.background, &card.foreground] {
        if !is_valid_color(color) {
            return Err(ef_core::Error::Validation(format!(
                "invalid card colour {color:?}"
            )));
        }
    }
    tracing::debug!(lines = card.lines.len(), "render card");
    run_ffmpeg(tools, card_args(card, output, target)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_target;
    use crate::render::CardLine;
    use std::time::Duration;

    fn card() -> CardSpec {
        CardSpec {
            lines: vec![
                CardLine::new("The Show", 96),
                CardLine::new("S01E02: Pilot", 48),
            ],
            duration: Duration::from_secs(4),
            background: "black".into(),
            foreground: "white".into(),
            fade: Duration::from_millis(500),
        }
    }

    #[test]
    fn escape_both_levels() {
        assert_eq!(escape_drawtext("plain"), "plain");
        assert_eq!(escape_drawtext("a:b"), "a\\\\:b");
        assert_eq!(escape_drawtext("it's"), "it\\\\\\'s");
        assert_eq!(escape_drawtext("a,b"), "a\\,b");
    }

    #[test]
    fn color_grammar() {
        assert!(is_valid_color("black"));
        assert!(is_valid_color("DarkSlateBlue"));
        assert!(is_valid_color("#1a2B3c"));
        assert!(is_valid_color("#1a2b3cff"));
        assert!(!is_valid_color(""));
        assert!(!is_valid_color("#123"));
        assert!(!is_valid_color("#12345g"));
        assert!(!is_valid_color("black:s=320x240"));
        assert!(!is_valid_color("white:textfile=/etc/passwd"));
        assert!(!is_valid_color("red,scale=2"));
    }

    #[tokio::test]
    async fn render_refuses_colours_with_filter_options() {
        let mut bad = card();
        bad.foreground = "white:textfile=/etc/passwd".into();
        let tools = ToolRegistry::default();
        let err = render_card(&tools, &bad, Path::new("card.mkv"), &test_target())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ef_core::ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("textfile"));
    }

    #[test]
    fn one_drawtext_per_line_with_fades() {
        let filter = card_filter(&card(), &test_target());
        assert_eq!(filter.matches("drawtext=").count(), 2);
        assert!(filter.contains("fontsize=96"));
        assert!(filter.contains("S01E02\\\\: Pilot"));
        assert!(filter.contains("fade=t=in:st=0:d=0.500"));
        assert!(filter.contains("fade=t=out:st=3.500:d=0.500"));
    }

    #[test]
    fn font_scales_with_height() {
        let mut target = test_target();
        target.resolution = ef_core::Resolution::HD;
        let filter = card_filter(&card(), &target);
        assert!(filter.contains("fontsize=64"));
    }

    #[test]
    fn lavfi_sources_match_target() {
        let args = card_args(&card(), Path::new("card.mkv"), &test_target());
        let joined = args.join(" ");
        assert!(joined.contains("-f lavfi -i color=c=black:s=1920x1080:r=30:d=4.000"));
        assert!(joined.contains("anullsrc=channel_layout=stereo:sample_rate=48000"));
        assert!(joined.contains("-t 4.000"));
    }
}
