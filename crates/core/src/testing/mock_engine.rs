//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};

use crate::engine::{
    split_command, Engine, EngineError, EngineEvent, EngineOutcome, ProgressSample,
};

/// How a scripted run ends.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResult {
    /// Write `output_bytes` bytes to the output path and report success.
    Success { output_bytes: usize },
    /// Report a failure with the given exit code and diagnostics.
    Fail { code: Option<i32>, output: String },
    /// Block until cancelled, then report `Cancelled`.
    WaitForCancel,
    /// Drop the event channel without a terminal event.
    Vanish,
}

/// One scripted engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRun {
    pub samples: Vec<ProgressSample>,
    /// Bytes written to the output path before the result is reported.
    pub partial_output: Option<usize>,
    pub result: MockResult,
}

impl MockRun {
    pub fn success(output_bytes: usize) -> Self {
        Self {
            samples: Vec::new(),
            partial_output: None,
            result: MockResult::Success { output_bytes },
        }
    }

    pub fn fail(code: i32, output: impl Into<String>) -> Self {
        Self {
            samples: Vec::new(),
            partial_output: None,
            result: MockResult::Fail {
                code: Some(code),
                output: output.into(),
            },
        }
    }

    pub fn wait_for_cancel() -> Self {
        Self {
            samples: Vec::new(),
            partial_output: None,
            result: MockResult::WaitForCancel,
        }
    }

    pub fn vanish() -> Self {
        Self {
            samples: Vec::new(),
            partial_output: None,
            result: MockResult::Vanish,
        }
    }

    /// Leaves `bytes` bytes at the output path, as an interrupted encode would.
    pub fn with_partial_output(mut self, bytes: usize) -> Self {
        self.partial_output = Some(bytes);
        self
    }

    /// Adds a progress sample emitted before the result.
    pub fn with_sample(mut self, processed_time_ms: u64, output_size_bytes: u64) -> Self {
        self.samples.push(ProgressSample {
            processed_time_ms,
            output_size_bytes,
        });
        self
    }
}

/// Mock implementation of the [`Engine`] trait.
///
/// Runs are consumed in order from a script; once it is empty every run
/// succeeds with a small output file. Every command is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use ffshare_core::testing::{MockEngine, MockRun};
///
/// let engine = MockEngine::new();
/// engine.push_run(MockRun::success(400).with_sample(5_000, 200)).await;
/// engine.push_run(MockRun::fail(1, "Invalid data found")).await;
///
/// // Run a job...
///
/// assert_eq!(engine.commands().await.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    script: Arc<RwLock<VecDeque<MockRun>>>,
    commands: Arc<RwLock<Vec<String>>>,
    validate_error: Arc<RwLock<Option<EngineError>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Default size of the output written by unscripted runs.
    pub const DEFAULT_OUTPUT_BYTES: usize = 64;

    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(VecDeque::new())),
            commands: Arc::new(RwLock::new(Vec::new())),
            validate_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Queue the next run.
    pub async fn push_run(&self, run: MockRun) {
        self.script.write().await.push_back(run);
    }

    /// All commands executed so far.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    /// Make `validate` fail with the given error.
    pub async fn set_validate_error(&self, error: EngineError) {
        *self.validate_error.write().await = Some(error);
    }

    async fn next_run(&self) -> MockRun {
        self.script
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| MockRun::success(Self::DEFAULT_OUTPUT_BYTES))
    }

    async fn write_output(&self, command: &str, bytes: usize) {
        if let Some(path) = Self::output_path(command) {
            if let Err(e) = tokio::fs::write(&path, vec![0u8; bytes]).await {
                tracing::debug!("Mock engine could not write {}: {}", path.display(), e);
            }
        }
    }

    /// The last token of a command is the output path.
    fn output_path(command: &str) -> Option<PathBuf> {
        split_command(command).pop().map(PathBuf::from)
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        command: String,
        events: mpsc::Sender<EngineEvent>,
        mut cancel: watch::Receiver<bool>,
    ) {
        self.commands.write().await.push(command.clone());

        if *cancel.borrow() {
            let _ = events
                .send(EngineEvent::finished(EngineOutcome::Cancelled, ""))
                .await;
            return;
        }

        let run = self.next_run().await;
        for sample in run.samples {
            let _ = events.send(EngineEvent::Progress(sample)).await;
        }

        if let Some(bytes) = run.partial_output {
            self.write_output(&command, bytes).await;
        }

        let event = match run.result {
            MockResult::Success { output_bytes } => {
                self.write_output(&command, output_bytes).await;
                EngineEvent::finished(EngineOutcome::Success, "")
            }
            MockResult::Fail { code, output } => {
                EngineEvent::finished(EngineOutcome::Failed { code }, output)
            }
            MockResult::WaitForCancel => {
                let cancelled = loop {
                    if *cancel.borrow_and_update() {
                        break true;
                    }
                    if cancel.changed().await.is_err() {
                        break false;
                    }
                };
                if cancelled {
                    EngineEvent::finished(EngineOutcome::Cancelled, "")
                } else {
                    EngineEvent::finished(EngineOutcome::Failed { code: None }, "cancel sender dropped")
                }
            }
            MockResult::Vanish => return,
        };

        let _ = events.send(event).await;
    }

    async fn validate(&self) -> Result<(), EngineError> {
        match self.validate_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
