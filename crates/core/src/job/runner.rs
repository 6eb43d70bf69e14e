//! Sequential batch runner.
//!
//! Encodes a list of inputs one after another. Per-file failures are
//! recorded and skipped; a cancellation acknowledged by the engine ends the
//! whole job.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::audit::{AuditHandle, EncodeRecord};
use crate::engine::{build_command, Engine, EngineEvent, EngineOutcome, Prober, ProgressSample};
use crate::media::{classify, MediaKind};
use crate::metrics;
use crate::planner::{self, EncodingSettings};

use super::output::{OutputPolicy, SuccessHook};
use super::progress;
use super::state::{JobState, StatePublisher};
use super::types::{EncodedOutput, FileError, FileResult, JobError};

/// Engine diagnostics kept in logs and results, in characters.
pub const MAX_DIAGNOSTICS_CHARS: usize = 2000;

/// Engine events buffered between the engine task and the runner.
const EVENT_BUFFER: usize = 64;

/// Requests cancellation of a running job.
///
/// Cloneable and usable from any task. Cancelling is idempotent.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

enum FileOutcome {
    Done(FileResult),
    Cancelled,
}

/// Runs one batch compression job.
///
/// A runner is single use: build a new one for every job.
pub struct JobRunner {
    id: Uuid,
    engine: Arc<dyn Engine>,
    prober: Arc<dyn Prober>,
    settings: EncodingSettings,
    output_policy: Arc<dyn OutputPolicy>,
    global_args: Vec<String>,
    hooks: Vec<Arc<dyn SuccessHook>>,
    audit: Option<AuditHandle>,
    state: StatePublisher,
    started: AtomicBool,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl JobRunner {
    pub fn new(
        engine: Arc<dyn Engine>,
        prober: Arc<dyn Prober>,
        settings: EncodingSettings,
        output_policy: Arc<dyn OutputPolicy>,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            engine,
            prober,
            settings,
            output_policy,
            global_args: Vec::new(),
            hooks: Vec::new(),
            audit: None,
            state: StatePublisher::default(),
            started: AtomicBool::new(false),
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    /// Emit an encode record for every attempted file.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Run `hooks` after every successful file, in order.
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn SuccessHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Global engine arguments placed before the input.
    pub fn with_global_args(mut self, args: Vec<String>) -> Self {
        self.global_args = args;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Subscribe to state transitions published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> JobState {
        self.state.current()
    }

    /// Shared handle on the state cell, for observers outliving a borrow.
    pub fn state_feed(&self) -> StatePublisher {
        self.state.clone()
    }

    /// Encodes `inputs` in order and returns the terminal state.
    pub async fn run(&self, inputs: Vec<PathBuf>) -> Result<JobState, JobError> {
        if inputs.is_empty() {
            return Err(JobError::NoInputs);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(JobError::AlreadyStarted);
        }

        let span = info_span!("job", id = %self.id, files = inputs.len());
        Ok(self.run_files(inputs).instrument(span).await)
    }

    async fn run_files(&self, inputs: Vec<PathBuf>) -> JobState {
        info!("Starting compression job");
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);

        for (index, input) in inputs.iter().enumerate() {
            if *self.cancel_tx.borrow() {
                return self.finish(JobState::Cancelled);
            }

            let span = info_span!("file", index = index + 1, input = %input.display());
            match self.process_file(index, total, input).instrument(span).await {
                FileOutcome::Done(result) => results.push(result),
                FileOutcome::Cancelled => return self.finish(JobState::Cancelled),
            }
        }

        self.finish(summarize(results))
    }

    fn finish(&self, state: JobState) -> JobState {
        metrics::JOBS_FINISHED
            .with_label_values(&[state.name()])
            .inc();
        match &state {
            JobState::Completed { outputs, .. } => {
                info!(
                    outputs = outputs.len(),
                    saved_bytes = state.saved_bytes().unwrap_or(0),
                    "Compression job completed"
                )
            }
            JobState::Failed { error } => warn!(error = %error, "Compression job failed"),
            _ => info!("Compression job {}", state.name()),
        }
        self.state.publish(state.clone());
        state
    }

    async fn process_file(&self, index: usize, total: usize, input: &Path) -> FileOutcome {
        let started = Instant::now();
        let file_name = display_name(input);
        let input_kind = classify(&input.to_string_lossy());

        if !input_kind.is_supported() {
            return self.file_failed(
                input,
                None,
                0,
                FileError::UnsupportedMediaType { name: file_name },
                started,
            );
        }

        let probe = match self.prober.probe(input).await {
            Ok(probe) => probe,
            Err(e) => {
                return self.file_failed(
                    input,
                    None,
                    0,
                    FileError::ProbeFailed {
                        reason: e.to_string(),
                    },
                    started,
                )
            }
        };

        let target = match self.output_policy.output_for(input, input_kind) {
            Ok(target) => target,
            Err(e) => {
                return self.file_failed(
                    input,
                    None,
                    probe.size_bytes,
                    FileError::OutputUnavailable {
                        reason: e.to_string(),
                    },
                    started,
                )
            }
        };

        let plan = planner::plan(
            &input.to_string_lossy(),
            &probe,
            input_kind,
            target.kind,
            &self.settings,
        );
        let command = build_command(&self.global_args, input, &plan.params, &target.path);
        debug!(command = %command, scaled = plan.scaled, "Starting engine");

        let total_duration_ms = if input_kind.is_image() {
            0
        } else {
            probe.duration_ms.unwrap_or(0)
        };

        let encoding = |sample: Option<ProgressSample>, wall_ms: u64| {
            let sample = sample.unwrap_or(ProgressSample {
                processed_time_ms: 0,
                output_size_bytes: 0,
            });
            let estimate = progress::estimate(sample.processed_time_ms, total_duration_ms, wall_ms);
            JobState::Encoding {
                current_file: index + 1,
                total_files: total,
                file_name: file_name.clone(),
                progress_percent: estimate.map_or(0.0, |p| p.percent),
                processed_time_ms: sample.processed_time_ms,
                total_duration_ms,
                eta_ms: estimate.and_then(|p| p.eta_ms),
                output_size_bytes: sample.output_size_bytes,
            }
        };

        self.state.publish(encoding(None, 0));

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let engine = Arc::clone(&self.engine);
        let cancel_rx = self.cancel_tx.subscribe();
        let engine_command = command.clone();
        let engine_started = Instant::now();
        let task = tokio::spawn(async move { engine.execute(engine_command, tx, cancel_rx).await });

        let mut last_sample = None;
        let (outcome, diagnostics) = loop {
            match rx.recv().await {
                Some(EngineEvent::Progress(sample)) => {
                    last_sample = Some(sample);
                    let wall_ms = engine_started.elapsed().as_millis() as u64;
                    self.state.publish(encoding(Some(sample), wall_ms));
                }
                Some(EngineEvent::Finished { outcome, output }) => break (outcome, output),
                None => {
                    break (
                        EngineOutcome::Failed { code: None },
                        "Engine stopped without reporting a result".to_string(),
                    )
                }
            }
        };

        if let Err(e) = task.await {
            warn!(error = %e, "Engine task did not finish cleanly");
        }

        match outcome {
            EngineOutcome::Success => {
                let output_bytes = match tokio::fs::metadata(&target.path).await {
                    Ok(meta) => meta.len(),
                    Err(_) => last_sample.map_or(0, |s| s.output_size_bytes),
                };

                for hook in &self.hooks {
                    if let Err(e) = hook.on_success(input, &target.path).await {
                        warn!(hook = hook.name(), error = %e, "Success hook failed");
                    }
                }

                let elapsed = started.elapsed();
                info!(
                    output = %target.path.display(),
                    input_bytes = probe.size_bytes,
                    output_bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "File compressed"
                );

                metrics::FILES_PROCESSED.with_label_values(&["success"]).inc();
                metrics::ENCODE_DURATION
                    .with_label_values(&[media_label(input_kind)])
                    .observe(elapsed.as_secs_f64());
                metrics::INPUT_BYTES.inc_by(probe.size_bytes);
                metrics::OUTPUT_BYTES.inc_by(output_bytes);

                self.emit_audit(EncodeRecord {
                    job_id: self.id.to_string(),
                    command: Some(command),
                    input_name: file_name,
                    output_name: Some(display_name(&target.path)),
                    success: true,
                    diagnostics: truncate_diagnostics(&diagnostics),
                    input_bytes: probe.size_bytes,
                    output_bytes,
                    duration_ms: elapsed.as_millis() as u64,
                });

                FileOutcome::Done(FileResult::Success(EncodedOutput {
                    input: input.to_path_buf(),
                    output: target.path,
                    input_bytes: probe.size_bytes,
                    output_bytes,
                }))
            }
            EngineOutcome::Cancelled => {
                info!("Engine acknowledged cancellation");
                remove_partial(&target.path).await;
                FileOutcome::Cancelled
            }
            EngineOutcome::Failed { code } => {
                remove_partial(&target.path).await;
                self.file_failed(
                    input,
                    Some(command),
                    probe.size_bytes,
                    FileError::EngineFailed {
                        code,
                        output: truncate_diagnostics(&diagnostics),
                    },
                    started,
                )
            }
        }
    }

    fn file_failed(
        &self,
        input: &Path,
        command: Option<String>,
        input_bytes: u64,
        error: FileError,
        started: Instant,
    ) -> FileOutcome {
        match &error {
            FileError::EngineFailed { code, output } => {
                warn!(code = ?code, diagnostics = %output, "Engine failed, skipping file")
            }
            other => warn!(error = %other, "Skipping file"),
        }
        metrics::FILES_PROCESSED
            .with_label_values(&[error.label()])
            .inc();

        let diagnostics = match &error {
            FileError::EngineFailed { output, .. } => output.clone(),
            other => other.to_string(),
        };
        self.emit_audit(EncodeRecord {
            job_id: self.id.to_string(),
            command,
            input_name: display_name(input),
            output_name: None,
            success: false,
            diagnostics,
            input_bytes,
            output_bytes: 0,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        FileOutcome::Done(FileResult::Failure {
            input: input.to_path_buf(),
            reason: error,
        })
    }

    fn emit_audit(&self, record: EncodeRecord) {
        if let Some(audit) = &self.audit {
            audit.try_emit(record);
        }
    }
}

/// Terminal state for a batch that ran to the end.
fn summarize(results: Vec<FileResult>) -> JobState {
    let attempted = results.len();
    let mut outputs = Vec::new();
    let mut last_error = None;

    for result in results {
        match result {
            FileResult::Success(output) => outputs.push(output),
            FileResult::Failure { reason, .. } => last_error = Some(reason),
        }
    }

    if outputs.is_empty() {
        let error = match last_error {
            Some(reason) if attempted == 1 => reason.to_string(),
            Some(reason) => format!("All {} files failed; last error: {}", attempted, reason),
            None => "No files were processed".to_string(),
        };
        return JobState::Failed { error };
    }

    let total_input_bytes = outputs.iter().map(|o| o.input_bytes).sum();
    let total_output_bytes = outputs.iter().map(|o| o.output_bytes).sum();
    JobState::Completed {
        outputs,
        total_input_bytes,
        total_output_bytes,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image(_) => "image",
        MediaKind::Video(_) => "video",
        MediaKind::Audio(_) => "audio",
        MediaKind::Unknown => "unknown",
    }
}

/// Keeps the tail of the diagnostics, where ffmpeg reports the error.
fn truncate_diagnostics(output: &str) -> String {
    let count = output.chars().count();
    if count <= MAX_DIAGNOSTICS_CHARS {
        return output.to_string();
    }
    output.chars().skip(count - MAX_DIAGNOSTICS_CHARS).collect()
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
