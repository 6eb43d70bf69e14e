//! Terminal output: job progress, encode history and metrics export.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use ffshare_core::audit::AuditRecord;
use ffshare_core::job::JobState;
use ffshare_core::metrics::register_metrics;

/// Prints job states as they are published.
pub struct StatePrinter {
    json: bool,
}

impl StatePrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Prints until the job ends or the feed closes.
    pub async fn run(self, mut rx: broadcast::Receiver<JobState>) {
        loop {
            match rx.recv().await {
                Ok(state) => {
                    self.print(&state);
                    if state.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "State printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn print(&self, state: &JobState) {
        if self.json {
            match serde_json::to_string(state) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize state: {}", e),
            }
            return;
        }

        match state {
            JobState::Encoding { .. } => {
                print!("\r\x1b[2K{}", state.summary());
                let _ = std::io::stdout().flush();
            }
            JobState::Completed { .. } => {
                println!("\r\x1b[2K{}", state.summary());
                if let Some(ratio) = state.compression_ratio() {
                    println!("Output is {:.0}% of the input size", ratio * 100.0);
                }
            }
            _ => println!("\r\x1b[2K{}", state.summary()),
        }
    }
}

/// Prints encode records, newest first.
pub fn print_history(records: &[AuditRecord]) {
    if records.is_empty() {
        println!("No matching encode records");
        return;
    }

    for record in records {
        let data = &record.data;
        let status = if data.success { "ok  " } else { "FAIL" };
        let detail = match (&data.output_name, data.ratio()) {
            (Some(output), Some(ratio)) => format!("-> {} ({:.0}%)", output, ratio * 100.0),
            (Some(output), None) => format!("-> {}", output),
            _ => last_line(&data.diagnostics).to_string(),
        };
        println!(
            "{} {} {} {} [{} ms]",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status,
            data.input_name,
            detail,
            data.duration_ms
        );
    }
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

/// Writes the core metrics in Prometheus text format.
pub fn write_metrics(path: &Path) -> Result<()> {
    let registry = Registry::new();
    register_metrics(&registry)?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    std::fs::write(path, buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");

        ffshare_core::metrics::FILES_PROCESSED
            .with_label_values(&["success"])
            .inc();
        write_metrics(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ffshare_files_processed_total"));
    }

    #[test]
    fn test_last_line_skips_trailing_blanks() {
        assert_eq!(last_line("a\nb\n\n"), "b");
        assert_eq!(last_line(""), "");
    }

    #[tokio::test]
    async fn test_printer_stops_on_terminal_state() {
        let (tx, rx) = broadcast::channel(4);
        tx.send(JobState::Cancelled).unwrap();
        // A sender stays alive, so only the terminal state can end the loop.
        StatePrinter::new(true).run(rx).await;
        drop(tx);
    }
}
