//! Parameter planning for the encoding engine.
//!
//! Turns the user's [`EncodingSettings`], the probed [`MediaProbe`](crate::engine::MediaProbe)
//! and the input/output media kinds into the ffmpeg parameter fragment for a
//! single file.
//!
//! # Example
//!
//! ```ignore
//! use ffshare_core::media::classify;
//! use ffshare_core::planner::{plan, EncodingSettings};
//!
//! let kind = classify("holiday.mp4");
//! let settings = EncodingSettings {
//!     max_video_resolution: 720,
//!     max_file_size_kb: 8 * 1024,
//!     ..Default::default()
//! };
//! let plan = plan("holiday.mp4", &probe, kind, kind, &settings);
//! println!("ffmpeg -i holiday.mp4 {} out.mp4", plan.params);
//! ```

pub mod bitrate;
mod params;
mod settings;

pub use bitrate::BitrateBudget;
pub use params::{plan, ParameterPlan, COLOR_NORMALIZE_FILTER};
pub use settings::{AudioCodec, EncodingSettings, Preset, VideoCodec};
