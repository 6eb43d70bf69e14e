//! Trait definitions for the engine module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::{mpsc, watch};

use super::error::EngineError;
use super::types::{EngineEvent, MediaProbe};

/// A transcoding engine driven by an opaque command string.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Runs one command to completion.
    ///
    /// Implementations send any number of `EngineEvent::Progress` samples
    /// followed by exactly one `EngineEvent::Finished`. When `cancel` flips to
    /// `true` the running operation is aborted and reported as
    /// `EngineOutcome::Cancelled`. A closed event channel must not stop the
    /// encode.
    async fn execute(
        &self,
        command: String,
        events: mpsc::Sender<EngineEvent>,
        cancel: watch::Receiver<bool>,
    );

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}

/// Extracts media information from an input.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes a media file.
    async fn probe(&self, input: &Path) -> Result<MediaProbe, EngineError>;
}
