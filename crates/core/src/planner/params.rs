//! Derivation of engine parameters from settings and probed media.

use tracing::debug;

use crate::engine::MediaProbe;
use crate::media::MediaKind;

use super::bitrate;
use super::settings::EncodingSettings;

/// Converts any source, SDR or HDR, to BT.709 limited range 4:2:0.
pub const COLOR_NORMALIZE_FILTER: &str =
    "zscale=p=bt709:t=bt709:m=bt709:r=tv:d=error_diffusion,format=yuv420p";

/// Frame rate assumed when the probe could not determine one.
const FALLBACK_FPS: f64 = 30.0;

/// Derived engine parameters for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPlan {
    /// Parameter fragment placed between the input and output references.
    pub params: String,
    /// Whether a resolution clamp was applied.
    pub scaled: bool,
}

/// Plans the engine parameters for one file.
///
/// Pure: the same arguments always produce the same plan.
pub fn plan(
    input: &str,
    probe: &MediaProbe,
    input_kind: MediaKind,
    output_kind: MediaKind,
    settings: &EncodingSettings,
) -> ParameterPlan {
    if let Some(raw) = settings.override_for(&output_kind) {
        debug!(input, "using raw parameter override");
        return ParameterPlan {
            params: raw.to_string(),
            scaled: false,
        };
    }

    let mut params: Vec<String> = Vec::new();
    let mut filters: Vec<String> = Vec::new();
    let video_codec = settings.video_codec;

    if output_kind.accepts_preset() {
        params.extend(["-preset".to_string(), settings.preset.as_ffmpeg().to_string()]);
    }

    if input_kind.is_audio() || input_kind.is_video() {
        if let Some(codec) = settings.audio_codec.ffmpeg_codec() {
            params.extend(["-c:a".to_string(), codec.to_string()]);
        }
    }

    let mut scaled = false;
    if input_kind.is_video() || input_kind.is_image() {
        let max = settings.max_resolution_for(&input_kind);
        if let (Some(width), Some(height)) = (probe.width, probe.height) {
            let portrait = height > width;
            let short_side = width.min(height);
            if max > 0 && short_side > max {
                let rounding = if output_kind.is_video() && video_codec.requires_even_dimensions() {
                    -2
                } else {
                    -1
                };
                let scale = if portrait {
                    format!("scale={}:{}", max, rounding)
                } else {
                    format!("scale={}:{}", rounding, max)
                };
                filters.push(scale);
                filters.push("setsar=1:1".to_string());
                scaled = true;
            }
        }
    }

    if output_kind.is_video() {
        filters.push(COLOR_NORMALIZE_FILTER.to_string());

        params.extend(["-c:v".to_string(), video_codec.ffmpeg_codec().to_string()]);
        params.extend(["-crf".to_string(), settings.crf.to_string()]);
        params.extend(["-g".to_string(), gop_size(probe.frame_rate).to_string()]);

        if !scaled {
            if let (Some(width), Some(height)) = (probe.width, probe.height) {
                if width % 2 != 0 || height % 2 != 0 {
                    filters.push(format!("crop={}:{}", width / 2 * 2, height / 2 * 2));
                }
            }
        }

        if settings.max_file_size_kb > 0 && output_kind.supports_bitrate_cap() {
            let budget = probe
                .duration_ms
                .and_then(|duration| bitrate::estimate(settings.max_file_size_kb, duration));
            if let Some(budget) = budget {
                params.extend([
                    "-b:a".to_string(),
                    format!("{}k", budget.audio_kbps),
                    "-maxrate".to_string(),
                    format!("{}k", budget.video_kbps),
                    "-bufsize".to_string(),
                    format!("{}k", budget.video_kbps),
                ]);
            }
        }
    }

    if !filters.is_empty() {
        params.extend(["-vf".to_string(), format!("\"{}\"", filters.join(","))]);
    }

    if output_kind.is_jpeg_family() {
        params.extend(["-q:v".to_string(), settings.jpeg_quality.to_string()]);
    }

    ParameterPlan {
        params: params.join(" "),
        scaled,
    }
}

/// Keyframe interval of two seconds worth of frames.
fn gop_size(frame_rate: Option<f64>) -> u32 {
    let fps = frame_rate
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .unwrap_or(FALLBACK_FPS);
    (fps * 2.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::classify;
    use crate::planner::{AudioCodec, Preset, VideoCodec};

    fn video_probe(width: u32, height: u32) -> MediaProbe {
        MediaProbe {
            duration_ms: Some(10_000),
            width: Some(width),
            height: Some(height),
            frame_rate: Some(30.0),
            size_bytes: 5_000_000,
        }
    }

    fn image_probe(width: u32, height: u32) -> MediaProbe {
        MediaProbe {
            duration_ms: None,
            width: Some(width),
            height: Some(height),
            frame_rate: None,
            size_bytes: 2_000_000,
        }
    }

    fn audio_probe() -> MediaProbe {
        MediaProbe {
            duration_ms: Some(180_000),
            width: None,
            height: None,
            frame_rate: None,
            size_bytes: 8_000_000,
        }
    }

    #[test]
    fn test_plain_video_plan() {
        let mp4 = classify("in.mp4");
        let plan = plan(
            "in.mp4",
            &video_probe(1920, 1080),
            mp4,
            mp4,
            &EncodingSettings::default(),
        );
        assert_eq!(
            plan.params,
            format!(
                "-preset medium -c:v libx264 -crf 23 -g 60 -vf \"{}\"",
                COLOR_NORMALIZE_FILTER
            )
        );
        assert!(!plan.scaled);
    }

    #[test]
    fn test_override_wins_for_every_category() {
        let settings = EncodingSettings {
            image_params: "-q:v 10".to_string(),
            video_params: "-c copy".to_string(),
            audio_params: "-b:a 64k".to_string(),
            max_video_resolution: 480,
            max_file_size_kb: 100,
            ..Default::default()
        };
        let cases = [
            ("a.mkv", video_probe(1921, 1081), "-c copy"),
            ("a.jpg", image_probe(4000, 3000), "-q:v 10"),
            ("a.mp3", audio_probe(), "-b:a 64k"),
        ];
        for (name, probe, expected) in cases {
            let kind = classify(name);
            let plan = plan(name, &probe, kind, kind, &settings);
            assert_eq!(plan.params, expected);
            assert!(!plan.scaled);
        }
    }

    #[test]
    fn test_override_follows_output_category() {
        let settings = EncodingSettings {
            audio_params: "-vn -b:a 96k".to_string(),
            ..Default::default()
        };
        let plan = plan(
            "a.mp4",
            &video_probe(1280, 720),
            classify("a.mp4"),
            classify("a.mp3"),
            &settings,
        );
        assert_eq!(plan.params, "-vn -b:a 96k");
    }

    #[test]
    fn test_png_output_has_no_preset() {
        let png = classify("a.png");
        let plan = plan("a.png", &image_probe(800, 600), png, png, &EncodingSettings::default());
        assert!(!plan.params.contains("-preset"));
        assert!(plan.params.is_empty());
    }

    #[test]
    fn test_audio_codec_only_for_audio_and_video_inputs() {
        let settings = EncodingSettings {
            audio_codec: AudioCodec::Opus,
            ..Default::default()
        };
        let ogg = classify("a.ogg");
        let plan_audio = plan("a.ogg", &audio_probe(), ogg, ogg, &settings);
        assert_eq!(plan_audio.params, "-preset medium -c:a libopus");

        let jpg = classify("a.jpg");
        let plan_image = plan("a.jpg", &image_probe(100, 100), jpg, jpg, &settings);
        assert!(!plan_image.params.contains("-c:a"));
    }

    #[test]
    fn test_landscape_video_scaled_with_even_rounding() {
        let settings = EncodingSettings {
            max_video_resolution: 720,
            ..Default::default()
        };
        let mp4 = classify("a.mp4");
        let plan = plan("a.mp4", &video_probe(1920, 1080), mp4, mp4, &settings);
        assert!(plan.scaled);
        assert!(plan.params.contains("\"scale=-2:720,setsar=1:1,zscale="));
    }

    #[test]
    fn test_portrait_video_scales_width() {
        let settings = EncodingSettings {
            max_video_resolution: 720,
            ..Default::default()
        };
        let mp4 = classify("a.mp4");
        let plan = plan("a.mp4", &video_probe(1080, 1920), mp4, mp4, &settings);
        assert!(plan.params.contains("scale=720:-2"));
    }

    #[test]
    fn test_non_even_codec_rounds_freely() {
        let settings = EncodingSettings {
            max_video_resolution: 720,
            video_codec: VideoCodec::Vp9,
            ..Default::default()
        };
        let webm = classify("a.webm");
        let plan = plan("a.webm", &video_probe(1920, 1080), webm, webm, &settings);
        assert!(plan.params.contains("scale=-1:720"));
        assert!(plan.params.contains("-c:v libvpx-vp9"));
    }

    #[test]
    fn test_image_scale_has_no_even_rounding() {
        let settings = EncodingSettings {
            max_image_resolution: 1080,
            ..Default::default()
        };
        let jpg = classify("a.jpg");
        let plan = plan("a.jpg", &image_probe(4000, 3000), jpg, jpg, &settings);
        assert_eq!(
            plan.params,
            "-preset medium -vf \"scale=-1:1080,setsar=1:1\" -q:v 5"
        );
        assert!(plan.scaled);
    }

    #[test]
    fn test_short_side_within_limit_is_untouched() {
        let settings = EncodingSettings {
            max_video_resolution: 1080,
            ..Default::default()
        };
        let mp4 = classify("a.mp4");
        let plan = plan("a.mp4", &video_probe(1920, 1080), mp4, mp4, &settings);
        assert!(!plan.scaled);
        assert!(!plan.params.contains("scale="));
    }

    #[test]
    fn test_unlimited_resolution_never_scales() {
        let mp4 = classify("a.mp4");
        let jpg = classify("a.jpg");
        for (w, h) in [(7680, 4320), (4321, 7681), (100, 100)] {
            let settings = EncodingSettings::default();
            let video = plan("a.mp4", &video_probe(w, h), mp4, mp4, &settings);
            let image = plan("a.jpg", &image_probe(w, h), jpg, jpg, &settings);
            assert!(!video.params.contains("scale="));
            assert!(!image.params.contains("scale="));
        }
    }

    #[test]
    fn test_odd_dimensions_are_cropped() {
        let mp4 = classify("a.mp4");
        let plan = plan(
            "a.mp4",
            &video_probe(1279, 721),
            mp4,
            mp4,
            &EncodingSettings::default(),
        );
        assert!(plan.params.ends_with(",crop=1278:720\""));
    }

    #[test]
    fn test_scale_and_crop_are_mutually_exclusive() {
        let mp4 = classify("a.mp4");
        for max in [0, 360, 720, 2000] {
            for (w, h) in [(1919, 1081), (1080, 1921), (641, 480), (1280, 720)] {
                let settings = EncodingSettings {
                    max_video_resolution: max,
                    ..Default::default()
                };
                let plan = plan("a.mp4", &video_probe(w, h), mp4, mp4, &settings);
                let has_scale = plan.params.contains("scale=-2") || plan.params.contains(":-2");
                let has_crop = plan.params.contains("crop=");
                assert!(!(has_scale && has_crop), "{}", plan.params);
            }
        }
    }

    #[test]
    fn test_size_cap_emits_bitrates() {
        let settings = EncodingSettings {
            max_file_size_kb: 1000,
            ..Default::default()
        };
        let mp4 = classify("a.mp4");
        let plan = plan("a.mp4", &video_probe(1280, 720), mp4, mp4, &settings);
        assert!(plan
            .params
            .contains("-g 60 -b:a 192k -maxrate 608k -bufsize 608k -vf"));
    }

    #[test]
    fn test_size_cap_skipped_for_webm_and_unknown_duration() {
        let settings = EncodingSettings {
            max_file_size_kb: 1000,
            ..Default::default()
        };
        let webm = classify("a.webm");
        let plan_webm = plan("a.webm", &video_probe(1280, 720), webm, webm, &settings);
        assert!(!plan_webm.params.contains("-maxrate"));

        let mp4 = classify("a.mp4");
        let mut probe = video_probe(1280, 720);
        probe.duration_ms = None;
        let plan_mp4 = plan("a.mp4", &probe, mp4, mp4, &settings);
        assert!(!plan_mp4.params.contains("-maxrate"));
    }

    #[test]
    fn test_gop_follows_frame_rate() {
        assert_eq!(gop_size(Some(23.976)), 48);
        assert_eq!(gop_size(Some(60.0)), 120);
        assert_eq!(gop_size(None), 60);
        assert_eq!(gop_size(Some(f64::NAN)), 60);
        assert_eq!(gop_size(Some(0.0)), 60);
    }

    #[test]
    fn test_preset_from_settings() {
        let settings = EncodingSettings {
            preset: Preset::Ultrafast,
            ..Default::default()
        };
        let mp3 = classify("a.mp3");
        let plan = plan("a.mp3", &audio_probe(), mp3, mp3, &settings);
        assert_eq!(plan.params, "-preset ultrafast");
    }

    #[test]
    fn test_plan_is_deterministic() {
        let settings = EncodingSettings {
            max_video_resolution: 480,
            max_file_size_kb: 5000,
            audio_codec: AudioCodec::Aac,
            ..Default::default()
        };
        let mkv = classify("a.mkv");
        let probe = video_probe(3840, 2160);
        let first = plan("a.mkv", &probe, mkv, mkv, &settings);
        let second = plan("a.mkv", &probe, mkv, mkv, &settings);
        assert_eq!(first, second);
    }
}
