//! Mock prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::{EngineError, MediaProbe, Prober};

/// Mock implementation of the [`Prober`] trait.
///
/// Answers from per-path results, then from a default probe. Paths marked
/// with [`MockProber::fail_for`] return `ProbeFailed`.
#[derive(Debug, Clone)]
pub struct MockProber {
    results: Arc<RwLock<HashMap<PathBuf, MediaProbe>>>,
    failures: Arc<RwLock<HashMap<PathBuf, String>>>,
    default_probe: Arc<RwLock<MediaProbe>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProber {
    /// A one-minute 1280x720 30 fps clip of 1 MB.
    pub fn default_video_probe() -> MediaProbe {
        MediaProbe {
            duration_ms: Some(60_000),
            width: Some(1280),
            height: Some(720),
            frame_rate: Some(30.0),
            size_bytes: 1_000_000,
        }
    }

    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            default_probe: Arc::new(RwLock::new(Self::default_video_probe())),
            probed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the probe result for a specific path.
    pub async fn set_result(&self, path: impl AsRef<Path>, probe: MediaProbe) {
        self.results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), probe);
    }

    /// Make probing `path` fail.
    pub async fn fail_for(&self, path: impl AsRef<Path>, reason: impl Into<String>) {
        self.failures
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), reason.into());
    }

    /// Set the probe returned for paths without a specific result.
    pub async fn set_default(&self, probe: MediaProbe) {
        *self.default_probe.write().await = probe;
    }

    /// Paths probed so far, in order.
    pub async fn probed(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, input: &Path) -> Result<MediaProbe, EngineError> {
        self.probed.write().await.push(input.to_path_buf());

        if let Some(reason) = self.failures.read().await.get(input) {
            return Err(EngineError::probe_failed(reason.clone()));
        }

        if let Some(probe) = self.results.read().await.get(input) {
            return Ok(probe.clone());
        }

        Ok(self.default_probe.read().await.clone())
    }
}
