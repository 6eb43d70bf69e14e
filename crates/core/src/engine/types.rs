//! Types exchanged with the engine and the prober.

use serde::{Deserialize, Serialize};

/// Probed information about an input file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Duration in milliseconds (absent or zero for still images).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Average frame rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Input size in bytes.
    pub size_bytes: u64,
}

/// A periodic progress sample from a running encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Media time processed so far, in milliseconds.
    pub processed_time_ms: u64,
    /// Bytes written to the output so far.
    pub output_size_bytes: u64,
}

/// How an engine invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EngineOutcome {
    /// The engine reported success.
    Success,
    /// The engine acknowledged a cancellation request.
    Cancelled,
    /// Any other result.
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
}

/// Event emitted by the engine while a command runs.
///
/// Progress and the terminal result share one channel so the consumer sees
/// them in the order the engine produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Periodic progress sample.
    Progress(ProgressSample),
    /// Terminal result, always the last event of a session.
    Finished {
        outcome: EngineOutcome,
        /// Free-text diagnostic output captured from the engine.
        output: String,
    },
}

impl EngineEvent {
    /// Shorthand for a terminal event.
    pub fn finished(outcome: EngineOutcome, output: impl Into<String>) -> Self {
        Self::Finished {
            outcome,
            output: output.into(),
        }
    }
}
