//! Engine module for running the external transcoder.
//!
//! This module provides the `Engine` and `Prober` traits and their FFmpeg
//! implementation. The engine receives an opaque command string and reports
//! progress samples and a terminal outcome over a single event channel.
//!
//! # Example
//!
//! ```ignore
//! use ffshare_core::engine::{build_command, Engine, EngineEvent, FfmpegEngine, Prober};
//! use tokio::sync::{mpsc, watch};
//!
//! let engine = FfmpegEngine::with_defaults();
//! engine.validate().await?;
//!
//! let probe = engine.probe(Path::new("/sdcard/clip.mp4")).await?;
//! println!("Duration: {:?} ms", probe.duration_ms);
//!
//! let command = build_command(&[], input, "-c:v libx264 -crf 28", output);
//! let (tx, mut rx) = mpsc::channel(32);
//! let (cancel_tx, cancel_rx) = watch::channel(false);
//! tokio::spawn(async move { engine.execute(command, tx, cancel_rx).await });
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         EngineEvent::Progress(sample) => println!("{} ms", sample.processed_time_ms),
//!         EngineEvent::Finished { outcome, .. } => println!("{:?}", outcome),
//!     }
//! }
//! ```

mod command;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use command::build_command;
pub(crate) use command::split_command;
pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use traits::{Engine, Prober};
pub use types::{EngineEvent, EngineOutcome, MediaProbe, ProgressSample};
