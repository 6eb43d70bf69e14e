//! Prometheus metrics for the encoding pipeline.
//!
//! This module provides metrics for:
//! - Jobs (terminal states)
//! - Files (per-file results, durations)
//! - Bytes read and written

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs finished by terminal state.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ffshare_jobs_finished_total", "Jobs that reached a terminal state"),
        &["state"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Files
// =============================================================================

/// Files processed by result.
pub static FILES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ffshare_files_processed_total", "Files processed by result"),
        &["result"], // "success", "unsupported", "probe_failed", "output_unavailable", "engine_failed"
    )
    .unwrap()
});

/// Wall-clock encode duration in seconds.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("ffshare_encode_duration_seconds", "Duration of single-file encodes")
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["media"], // "image", "video", "audio"
    )
    .unwrap()
});

// =============================================================================
// Bytes
// =============================================================================

/// Input bytes of successfully encoded files.
pub static INPUT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ffshare_input_bytes_total", "Input bytes of encoded files").unwrap()
});

/// Output bytes of successfully encoded files.
pub static OUTPUT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ffshare_output_bytes_total", "Output bytes of encoded files").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_FINISHED.clone()),
        Box::new(FILES_PROCESSED.clone()),
        Box::new(ENCODE_DURATION.clone()),
        Box::new(INPUT_BYTES.clone()),
        Box::new(OUTPUT_BYTES.clone()),
    ]
}

/// Registers all core metrics in `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
