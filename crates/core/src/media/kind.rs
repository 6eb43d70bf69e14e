//! Media kinds and their sub-tags.

use serde::{Deserialize, Serialize};

/// Still image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Returns the canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

/// Video container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContainer {
    Mp4,
    Mkv,
    Webm,
    Avi,
    Mov,
    #[serde(rename = "3gp")]
    ThreeGp,
}

impl VideoContainer {
    /// Returns the canonical file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::ThreeGp => "3gp",
        }
    }
}

/// Audio formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Ogg,
    Aac,
    Wav,
    Opus,
    Flac,
}

impl AudioFormat {
    /// Returns the canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Aac => "m4a",
            Self::Wav => "wav",
            Self::Opus => "opus",
            Self::Flac => "flac",
        }
    }
}

/// The kind of a media file, with its concrete format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "format", rename_all = "snake_case")]
pub enum MediaKind {
    Image(ImageFormat),
    Video(VideoContainer),
    Audio(AudioFormat),
    Unknown,
}

impl MediaKind {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }

    /// Everything except `Unknown` can be handed to the engine.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the file extension for this kind, if it has one.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Image(f) => Some(f.extension()),
            Self::Video(c) => Some(c.extension()),
            Self::Audio(f) => Some(f.extension()),
            Self::Unknown => None,
        }
    }

    /// Whether the encoder for this output accepts a `-preset` option.
    ///
    /// Lossless-only image containers reject it.
    pub fn accepts_preset(&self) -> bool {
        !matches!(
            self,
            Self::Image(ImageFormat::Png | ImageFormat::Gif | ImageFormat::Bmp)
        )
    }

    /// Whether the container tolerates `-maxrate`/`-bufsize` capping.
    pub fn supports_bitrate_cap(&self) -> bool {
        matches!(self, Self::Video(c) if *c != VideoContainer::Webm)
    }

    /// Whether the output is encoded with the mjpeg quality scale.
    pub fn is_jpeg_family(&self) -> bool {
        matches!(self, Self::Image(ImageFormat::Jpeg))
    }

    fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jfif" => Self::Image(ImageFormat::Jpeg),
            "png" => Self::Image(ImageFormat::Png),
            "webp" => Self::Image(ImageFormat::Webp),
            "gif" => Self::Image(ImageFormat::Gif),
            "bmp" => Self::Image(ImageFormat::Bmp),
            "mp4" | "m4v" => Self::Video(VideoContainer::Mp4),
            "mkv" => Self::Video(VideoContainer::Mkv),
            "webm" => Self::Video(VideoContainer::Webm),
            "avi" => Self::Video(VideoContainer::Avi),
            "mov" => Self::Video(VideoContainer::Mov),
            "3gp" => Self::Video(VideoContainer::ThreeGp),
            "mp3" => Self::Audio(AudioFormat::Mp3),
            "ogg" | "oga" => Self::Audio(AudioFormat::Ogg),
            "aac" | "m4a" => Self::Audio(AudioFormat::Aac),
            "wav" => Self::Audio(AudioFormat::Wav),
            "opus" => Self::Audio(AudioFormat::Opus),
            "flac" => Self::Audio(AudioFormat::Flac),
            _ => Self::Unknown,
        }
    }
}

/// Classifies a filename, path or URI by its extension.
///
/// Query strings and fragments are ignored, as is everything before the last
/// path separator. Unknown or missing extensions map to `MediaKind::Unknown`.
pub fn classify(name: &str) -> MediaKind {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);

    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => MediaKind::from_extension(ext),
        _ => MediaKind::Unknown,
    }
}

/// Classifies a mime type such as `video/mp4` or `image/jpeg`.
pub fn classify_mime(mime: &str) -> MediaKind {
    let mime = mime.split(';').next().unwrap_or(mime).trim();
    let Some((top, sub)) = mime.split_once('/') else {
        return MediaKind::Unknown;
    };

    let kind = match sub.to_ascii_lowercase().as_str() {
        "jpeg" | "pjpeg" => MediaKind::Image(ImageFormat::Jpeg),
        "png" => MediaKind::Image(ImageFormat::Png),
        "webp" => MediaKind::Image(ImageFormat::Webp),
        "gif" => MediaKind::Image(ImageFormat::Gif),
        "bmp" | "x-ms-bmp" => MediaKind::Image(ImageFormat::Bmp),
        "mp4" if top.eq_ignore_ascii_case("video") => MediaKind::Video(VideoContainer::Mp4),
        "mp4" | "mp4a-latm" | "aac" | "x-m4a" => MediaKind::Audio(AudioFormat::Aac),
        "x-matroska" => MediaKind::Video(VideoContainer::Mkv),
        "webm" if top.eq_ignore_ascii_case("video") => MediaKind::Video(VideoContainer::Webm),
        "x-msvideo" | "avi" => MediaKind::Video(VideoContainer::Avi),
        "quicktime" => MediaKind::Video(VideoContainer::Mov),
        "3gpp" if top.eq_ignore_ascii_case("video") => MediaKind::Video(VideoContainer::ThreeGp),
        "mpeg" | "mp3" => MediaKind::Audio(AudioFormat::Mp3),
        "ogg" | "vorbis" => MediaKind::Audio(AudioFormat::Ogg),
        "wav" | "x-wav" | "wave" => MediaKind::Audio(AudioFormat::Wav),
        "opus" => MediaKind::Audio(AudioFormat::Opus),
        "flac" | "x-flac" => MediaKind::Audio(AudioFormat::Flac),
        _ => MediaKind::Unknown,
    };

    // The top-level type has to agree with the sub-type we matched.
    let agrees = match kind {
        MediaKind::Image(_) => top.eq_ignore_ascii_case("image"),
        MediaKind::Video(_) => top.eq_ignore_ascii_case("video"),
        MediaKind::Audio(_) => top.eq_ignore_ascii_case("audio"),
        MediaKind::Unknown => true,
    };
    if agrees {
        kind
    } else {
        MediaKind::Unknown
    }
}
