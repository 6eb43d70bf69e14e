//! Batch compression jobs.
//!
//! A [`JobRunner`] encodes its inputs sequentially and publishes every
//! [`JobState`] transition:
//!
//! ```text
//! Idle -> Encoding(file 1) -> ... -> Encoding(file N) -> Completed | Failed
//!                      \________________________________/
//!                                     -> Cancelled
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ffshare_core::job::{DefaultOutputPolicy, JobRunner};
//!
//! let runner = JobRunner::new(engine, prober, settings, Arc::new(DefaultOutputPolicy::default()));
//! let mut states = runner.subscribe();
//! let cancel = runner.cancel_handle();
//!
//! tokio::spawn(async move {
//!     while let Ok(state) = states.recv().await {
//!         println!("{}", state.summary());
//!     }
//! });
//!
//! let final_state = runner.run(inputs).await?;
//! ```

mod output;
pub mod progress;
mod runner;
mod state;
mod types;

pub use output::{
    hooks_for, CopyToDirectoryHook, DefaultOutputPolicy, HookError, OutputConfig, OutputError,
    OutputPolicy, OutputTarget, PreserveModifiedTimeHook, SuccessHook,
};
pub use runner::{CancelHandle, JobRunner, MAX_DIAGNOSTICS_CHARS};
pub use state::{JobState, StatePublisher, DEFAULT_STATE_CAPACITY};
pub use types::{EncodedOutput, FileError, FileResult, JobError};
