//! Media classification.
//!
//! Maps filenames, URIs and mime types onto a closed set of media kinds and
//! answers the capability questions the parameter planner asks about an
//! output format (does it take `-preset`, can it be rate-capped, ...).

mod kind;

pub use kind::{classify, classify_mime, AudioFormat, ImageFormat, MediaKind, VideoContainer};
