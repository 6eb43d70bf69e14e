//! Testing utilities and mock implementations.
//!
//! Mocks for the [`Engine`](crate::engine::Engine) and
//! [`Prober`](crate::engine::Prober) traits, so jobs can be driven end to end
//! without an ffmpeg install.
//!
//! # Example
//!
//! ```rust,ignore
//! use ffshare_core::testing::{MockEngine, MockProber, MockRun};
//!
//! let engine = MockEngine::new();
//! let prober = MockProber::new();
//!
//! prober.fail_for("/sdcard/broken.mp4", "moov atom not found").await;
//! engine.push_run(MockRun::success(500).with_sample(30_000, 250)).await;
//! ```

mod mock_engine;
mod mock_prober;

pub use mock_engine::{MockEngine, MockResult, MockRun};
pub use mock_prober::MockProber;
