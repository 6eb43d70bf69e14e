//! User-facing encoding policy.

use serde::{Deserialize, Serialize};

use crate::media::MediaKind;

/// x264-style speed/size trade-off preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    /// Returns the ffmpeg preset name.
    pub fn as_ffmpeg(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

/// Audio codec selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Let the engine pick the container's default.
    #[default]
    Default,
    Aac,
    Opus,
    Mp3,
    Vorbis,
}

impl AudioCodec {
    /// Returns the ffmpeg encoder name, `None` for `Default`.
    pub fn ffmpeg_codec(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Aac => Some("aac"),
            Self::Opus => Some("libopus"),
            Self::Mp3 => Some("libmp3lame"),
            Self::Vorbis => Some("libvorbis"),
        }
    }
}

/// Video codec selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// Software H.264. Hardware encoders mishandle HDR input.
    #[default]
    Default,
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Resolves `Default` to the concrete codec used.
    pub fn effective(&self) -> Self {
        match self {
            Self::Default => Self::H264,
            other => *other,
        }
    }

    /// Returns the ffmpeg encoder name.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self.effective() {
            Self::H264 | Self::Default => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libsvtav1",
        }
    }

    /// Encoders that refuse odd frame dimensions.
    pub fn requires_even_dimensions(&self) -> bool {
        matches!(self.effective(), Self::H264 | Self::H265)
    }
}

/// Encoding policy applied to every file of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Compression preset.
    #[serde(default = "default_preset")]
    pub preset: Preset,

    /// Audio codec for audio and video outputs.
    #[serde(default)]
    pub audio_codec: AudioCodec,

    /// Video codec for video outputs.
    #[serde(default)]
    pub video_codec: VideoCodec,

    /// Constant rate factor (0-51, lower is better quality).
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Maximum short-side resolution for images (0 = unlimited).
    #[serde(default)]
    pub max_image_resolution: u32,

    /// Maximum short-side resolution for videos (0 = unlimited).
    #[serde(default)]
    pub max_video_resolution: u32,

    /// Maximum output size in kilobytes (0 = unlimited).
    #[serde(default)]
    pub max_file_size_kb: u64,

    /// mjpeg quality scale, 2 (best) to 31 (worst).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Raw parameters replacing everything derived for images.
    #[serde(default)]
    pub image_params: String,

    /// Raw parameters replacing everything derived for videos.
    #[serde(default)]
    pub video_params: String,

    /// Raw parameters replacing everything derived for audio.
    #[serde(default)]
    pub audio_params: String,
}

fn default_preset() -> Preset {
    Preset::Medium
}

fn default_crf() -> u8 {
    23
}

fn default_jpeg_quality() -> u8 {
    5
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            audio_codec: AudioCodec::Default,
            video_codec: VideoCodec::Default,
            crf: default_crf(),
            max_image_resolution: 0,
            max_video_resolution: 0,
            max_file_size_kb: 0,
            jpeg_quality: default_jpeg_quality(),
            image_params: String::new(),
            video_params: String::new(),
            audio_params: String::new(),
        }
    }
}

impl EncodingSettings {
    /// Returns the raw override for the category of `kind`, if one is set.
    pub fn override_for(&self, kind: &MediaKind) -> Option<&str> {
        let params = match kind {
            MediaKind::Image(_) => &self.image_params,
            MediaKind::Video(_) => &self.video_params,
            MediaKind::Audio(_) => &self.audio_params,
            MediaKind::Unknown => return None,
        };
        if params.is_empty() {
            None
        } else {
            Some(params.as_str())
        }
    }

    /// Returns the resolution limit for the category of `kind` (0 = none).
    pub fn max_resolution_for(&self, kind: &MediaKind) -> u32 {
        match kind {
            MediaKind::Image(_) => self.max_image_resolution,
            MediaKind::Video(_) => self.max_video_resolution,
            _ => 0,
        }
    }
}
