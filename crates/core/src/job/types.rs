//! Types for the job module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A successfully compressed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedOutput {
    /// Input file.
    pub input: PathBuf,
    /// Output file written by the engine.
    pub output: PathBuf,
    /// Input size in bytes.
    pub input_bytes: u64,
    /// Output size in bytes.
    pub output_bytes: u64,
}

/// Why a single file was skipped. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    /// The file is not an image, video or audio file we recognise.
    #[error("Unsupported media type: {name}")]
    UnsupportedMediaType { name: String },

    /// Media information could not be obtained.
    #[error("Failed to probe media: {reason}")]
    ProbeFailed { reason: String },

    /// No output destination could be derived.
    #[error("Output unavailable: {reason}")]
    OutputUnavailable { reason: String },

    /// The engine reported a failure.
    #[error("Engine failed with code {code:?}")]
    EngineFailed {
        code: Option<i32>,
        /// Engine diagnostics, truncated.
        output: String,
    },
}

impl FileError {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType { .. } => "unsupported",
            Self::ProbeFailed { .. } => "probe_failed",
            Self::OutputUnavailable { .. } => "output_unavailable",
            Self::EngineFailed { .. } => "engine_failed",
        }
    }
}

/// Result of one file of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum FileResult {
    Success(EncodedOutput),
    Failure { input: PathBuf, reason: FileError },
}

/// Errors returned by [`JobRunner::run`](super::JobRunner::run).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    /// The batch was empty.
    #[error("No input files")]
    NoInputs,

    /// The runner already ran; build a new one for the next job.
    #[error("Job runner already started")]
    AlreadyStarted,
}
