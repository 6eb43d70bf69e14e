//! Observable job state.
//!
//! The runner owns one [`StatePublisher`]. Observers either read the latest
//! value with [`StatePublisher::current`] or subscribe to every transition
//! published after they attach.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::warn;

use super::types::EncodedOutput;

/// State of an encoding job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Created, not started.
    Idle,
    /// A file is being encoded.
    Encoding {
        /// 1-based index of the file.
        current_file: usize,
        total_files: usize,
        file_name: String,
        /// 0 to 100; stays 0 for media without a duration.
        progress_percent: f64,
        processed_time_ms: u64,
        total_duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_ms: Option<u64>,
        output_size_bytes: u64,
    },
    /// Every file was attempted and at least one succeeded.
    Completed {
        outputs: Vec<EncodedOutput>,
        total_input_bytes: u64,
        total_output_bytes: u64,
    },
    /// Every file was attempted and none succeeded.
    Failed { error: String },
    /// The engine acknowledged a cancellation request.
    Cancelled,
}

impl JobState {
    /// Whether no further transitions can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }

    /// Returns the state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Encoding { .. } => "encoding",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Bytes saved by a completed job (zero if outputs grew).
    pub fn saved_bytes(&self) -> Option<u64> {
        match self {
            Self::Completed {
                total_input_bytes,
                total_output_bytes,
                ..
            } => Some(total_input_bytes.saturating_sub(*total_output_bytes)),
            _ => None,
        }
    }

    /// Output size as a fraction of input size for a completed job.
    pub fn compression_ratio(&self) -> Option<f64> {
        match self {
            Self::Completed {
                total_input_bytes,
                total_output_bytes,
                ..
            } if *total_input_bytes > 0 => {
                Some(*total_output_bytes as f64 / *total_input_bytes as f64)
            }
            _ => None,
        }
    }

    /// One-line human readable description.
    pub fn summary(&self) -> String {
        match self {
            Self::Idle => "Idle".to_string(),
            Self::Encoding {
                current_file,
                total_files,
                file_name,
                progress_percent,
                total_duration_ms,
                eta_ms,
                ..
            } => {
                let mut text = format!("Compressing {}/{} {}", current_file, total_files, file_name);
                if *total_duration_ms > 0 {
                    text.push_str(&format!(" {:.0}%", progress_percent));
                }
                if let Some(eta) = eta_ms {
                    text.push_str(&format!(" (ETA {})", format_duration(*eta)));
                }
                text
            }
            Self::Completed {
                outputs,
                total_input_bytes,
                total_output_bytes,
            } => format!(
                "Compressed {} file{}: {} -> {}",
                outputs.len(),
                if outputs.len() == 1 { "" } else { "s" },
                format_bytes(*total_input_bytes),
                format_bytes(*total_output_bytes)
            ),
            Self::Failed { error } => format!("Failed: {}", error),
            Self::Cancelled => "Cancelled".to_string(),
        }
    }
}

fn format_duration(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Default number of transitions buffered per subscriber.
pub const DEFAULT_STATE_CAPACITY: usize = 64;

/// Current-value cell plus broadcast fan-out of [`JobState`] transitions.
///
/// Cloning yields another handle to the same cell.
#[derive(Clone)]
pub struct StatePublisher {
    current: Arc<RwLock<JobState>>,
    tx: broadcast::Sender<JobState>,
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_CAPACITY)
    }
}

impl StatePublisher {
    /// Creates a publisher in the `Idle` state.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            current: Arc::new(RwLock::new(JobState::Idle)),
            tx,
        }
    }

    /// Returns the latest published state.
    pub fn current(&self) -> JobState {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Subscribes to transitions published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobState> {
        self.tx.subscribe()
    }

    /// Publishes a new state. Returns `false` if the job already ended.
    pub(crate) fn publish(&self, state: JobState) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if current.is_terminal() {
            warn!(
                from = current.name(),
                to = state.name(),
                "Ignoring state transition after terminal state"
            );
            return false;
        }

        *current = state.clone();
        // No subscribers is fine.
        let _ = self.tx.send(state);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn encoding(file: usize, percent: f64) -> JobState {
        JobState::Encoding {
            current_file: file,
            total_files: 3,
            file_name: format!("clip{}.mp4", file),
            progress_percent: percent,
            processed_time_ms: 0,
            total_duration_ms: 60_000,
            eta_ms: None,
            output_size_bytes: 0,
        }
    }

    #[test]
    fn test_starts_idle() {
        let publisher = StatePublisher::default();
        assert_eq!(publisher.current(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_subscribers_receive_every_transition() {
        let publisher = StatePublisher::default();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        assert!(publisher.publish(encoding(1, 0.0)));
        assert!(publisher.publish(encoding(1, 50.0)));
        assert!(publisher.publish(JobState::Cancelled));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap(), encoding(1, 0.0));
            assert_eq!(rx.recv().await.unwrap(), encoding(1, 50.0));
            assert_eq!(rx.recv().await.unwrap(), JobState::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_new_states() {
        let publisher = StatePublisher::default();
        publisher.publish(encoding(1, 10.0));

        let mut late = publisher.subscribe();
        assert_eq!(publisher.current(), encoding(1, 10.0));

        publisher.publish(encoding(2, 0.0));
        assert_eq!(late.recv().await.unwrap(), encoding(2, 0.0));
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let publisher = StatePublisher::default();
        let mut rx = publisher.subscribe();

        assert!(publisher.publish(JobState::Failed {
            error: "nothing worked".to_string()
        }));
        assert!(!publisher.publish(encoding(1, 0.0)));
        assert!(!publisher.publish(JobState::Cancelled));

        assert!(matches!(publisher.current(), JobState::Failed { .. }));
        assert!(matches!(rx.try_recv(), Ok(JobState::Failed { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_completed_savings() {
        let state = JobState::Completed {
            outputs: vec![EncodedOutput {
                input: PathBuf::from("a.mp4"),
                output: PathBuf::from("a_compressed.mp4"),
                input_bytes: 4000,
                output_bytes: 1000,
            }],
            total_input_bytes: 4000,
            total_output_bytes: 1000,
        };
        assert_eq!(state.saved_bytes(), Some(3000));
        assert_eq!(state.compression_ratio(), Some(0.25));
        assert!(state.is_terminal());
        assert_eq!(JobState::Idle.saved_bytes(), None);
    }

    #[test]
    fn test_summary() {
        let state = JobState::Encoding {
            current_file: 2,
            total_files: 5,
            file_name: "clip.mp4".to_string(),
            progress_percent: 43.4,
            processed_time_ms: 26_000,
            total_duration_ms: 60_000,
            eta_ms: Some(12_000),
            output_size_bytes: 0,
        };
        assert_eq!(state.summary(), "Compressing 2/5 clip.mp4 43% (ETA 12s)");

        let completed = JobState::Completed {
            outputs: vec![],
            total_input_bytes: 2048,
            total_output_bytes: 512,
        };
        assert_eq!(completed.summary(), "Compressed 0 files: 2.0 KB -> 512 B");
        assert_eq!(format_duration(125_000), "2m05s");
        assert_eq!(format_duration(3_720_000), "1h02m");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&encoding(1, 12.5)).unwrap();
        assert!(json.contains("\"state\":\"encoding\""));
        assert!(json.contains("\"progress_percent\":12.5"));
        assert!(!json.contains("eta_ms"));

        let parsed: JobState = serde_json::from_str(r#"{"state":"cancelled"}"#).unwrap();
        assert_eq!(parsed, JobState::Cancelled);
    }
}
