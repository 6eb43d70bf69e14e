//! FFmpeg-based engine and FFprobe-based prober.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::command::split_command;
use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::{Engine, Prober};
use super::types::{EngineEvent, EngineOutcome, MediaProbe, ProgressSample};

/// FFmpeg-based engine implementation.
pub struct FfmpegEngine {
    config: EngineConfig,
}

/// Progress block fields collected from `-progress pipe:2`.
#[derive(Default)]
struct ProgressParser {
    time_regex: Option<Regex>,
    size_regex: Option<Regex>,
    processed_time_ms: u64,
    output_size_bytes: u64,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            time_regex: Regex::new(r"^out_time_(?:us|ms)=(\d+)$").ok(),
            size_regex: Regex::new(r"^total_size=(\d+)$").ok(),
            ..Default::default()
        }
    }

    /// Feeds one stderr line. Returns a sample when a progress block ends,
    /// `None` otherwise. `Some(None)` means the line was not progress output.
    fn feed(&mut self, line: &str) -> Option<Option<ProgressSample>> {
        let line = line.trim();

        if let Some(caps) = self.time_regex.as_ref().and_then(|re| re.captures(line)) {
            // Both keys carry microseconds.
            if let Some(us) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                self.processed_time_ms = us / 1000;
            }
            return Some(None);
        }

        if let Some(caps) = self.size_regex.as_ref().and_then(|re| re.captures(line)) {
            if let Some(size) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                self.output_size_bytes = size;
            }
            return Some(None);
        }

        if line.starts_with("progress=") {
            return Some(Some(ProgressSample {
                processed_time_ms: self.processed_time_ms,
                output_size_bytes: self.output_size_bytes,
            }));
        }

        if is_progress_key(line) {
            return Some(None);
        }

        None
    }
}

/// Other `key=value` lines of a progress block (frame=, fps=, speed=, ...).
fn is_progress_key(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds the process arguments for a command string.
    fn build_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        args.extend(split_command(command));
        args
    }

    /// Appends a stderr line, dropping the oldest lines once the buffer
    /// exceeds `max_diagnostics_bytes`. The last lines carry the error.
    fn push_diagnostics(&self, buffer: &mut String, line: &str) {
        buffer.push_str(line);
        buffer.push('\n');

        let max = self.config.max_diagnostics_bytes;
        if buffer.len() <= max {
            return;
        }

        let mut cut = buffer.len() - max;
        while !buffer.is_char_boundary(cut) {
            cut += 1;
        }
        // Cut at a line start unless the newest line alone is over the cap.
        if !buffer[..cut].ends_with('\n') {
            if let Some(pos) = buffer[cut..].find('\n') {
                if cut + pos + 1 < buffer.len() {
                    cut += pos + 1;
                }
            }
        }
        buffer.drain(..cut);
    }

    /// Parses ffprobe JSON output into a MediaProbe.
    fn parse_probe_output(output: &str) -> Result<MediaProbe, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            width: Option<u32>,
            height: Option<u32>,
            avg_frame_rate: Option<String>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EngineError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_ms = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| (secs * 1000.0).round() as u64);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        Ok(MediaProbe {
            duration_ms,
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
            frame_rate: video_stream.and_then(|s| {
                s.avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
            }),
            size_bytes,
        })
    }
}

/// Parses a frame rate like "24000/1001", "30/1" or "25".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den > 0.0 {
                num / den
            } else {
                return None;
            }
        }
        None => rate.parse::<f64>().ok()?,
    };
    if fps.is_finite() && fps > 0.0 {
        Some(fps)
    } else {
        None
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn execute(
        &self,
        command: String,
        events: mpsc::Sender<EngineEvent>,
        mut cancel: watch::Receiver<bool>,
    ) {
        if *cancel.borrow() {
            let _ = events
                .send(EngineEvent::finished(EngineOutcome::Cancelled, "cancelled before start"))
                .await;
            return;
        }

        let args = self.build_args(&command);
        debug!(ffmpeg = %self.config.ffmpeg_path.display(), ?args, "spawning ffmpeg");

        let spawned = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let reason = if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                    .to_string()
                } else {
                    EngineError::Io(e).to_string()
                };
                let _ = events
                    .send(EngineEvent::finished(EngineOutcome::Failed { code: None }, reason))
                    .await;
                return;
            }
        };

        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill().await;
            let _ = events
                .send(EngineEvent::finished(
                    EngineOutcome::Failed { code: None },
                    "stderr was not captured",
                ))
                .await;
            return;
        };
        let mut reader = BufReader::new(stderr).lines();

        let mut parser = ProgressParser::new();
        let mut diagnostics = String::new();
        let mut watching_cancel = true;
        let mut cancelled = false;

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    match line {
                        Ok(Some(line)) => match parser.feed(&line) {
                            Some(Some(sample)) => {
                                // Progress is best effort; a slow consumer drops samples.
                                let _ = events.try_send(EngineEvent::Progress(sample));
                            }
                            Some(None) => {}
                            None => self.push_diagnostics(&mut diagnostics, &line),
                        },
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Failed to read ffmpeg output: {}", e);
                            break;
                        }
                    }
                }
                changed = cancel.changed(), if watching_cancel => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            debug!("cancelling ffmpeg");
                            if let Err(e) = child.start_kill() {
                                warn!("Failed to kill ffmpeg: {}", e);
                            }
                            cancelled = true;
                            watching_cancel = false;
                        }
                        Ok(()) => {}
                        Err(_) => watching_cancel = false,
                    }
                }
            }
        }

        let outcome = match child.wait().await {
            _ if cancelled => EngineOutcome::Cancelled,
            Ok(status) if status.success() => EngineOutcome::Success,
            Ok(status) => EngineOutcome::Failed {
                code: status.code(),
            },
            Err(e) => {
                self.push_diagnostics(&mut diagnostics, &e.to_string());
                EngineOutcome::Failed { code: None }
            }
        };

        let _ = events.send(EngineEvent::finished(outcome, diagnostics)).await;
    }

    async fn validate(&self) -> Result<(), EngineError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        Ok(())
    }
}

#[async_trait]
impl Prober for FfmpegEngine {
    async fn probe(&self, input: &Path) -> Result<MediaProbe, EngineError> {
        if !input.exists() {
            return Err(EngineError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(input)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut probe = Self::parse_probe_output(&stdout)?;
        if probe.size_bytes == 0 {
            probe.size_bytes = tokio::fs::metadata(input).await?.len();
        }
        Ok(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_prefixes_progress_flags() {
        let engine = FfmpegEngine::with_defaults();
        let args = engine.build_args("-y -i \"a b.mp4\" -crf 23 \"out.mp4\"");
        assert_eq!(
            args,
            vec![
                "-loglevel", "warning", "-nostats", "-progress", "pipe:2", "-y", "-i", "a b.mp4",
                "-crf", "23", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_progress_parser_emits_on_block_end() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("frame=120"), Some(None));
        assert_eq!(parser.feed("out_time_us=4000000"), Some(None));
        assert_eq!(parser.feed("total_size=262144"), Some(None));
        assert_eq!(parser.feed("speed=2.1x"), Some(None));
        assert_eq!(
            parser.feed("progress=continue"),
            Some(Some(ProgressSample {
                processed_time_ms: 4000,
                output_size_bytes: 262144,
            }))
        );

        // Final block.
        assert_eq!(parser.feed("out_time_us=6500000"), Some(None));
        assert_eq!(
            parser.feed("progress=end"),
            Some(Some(ProgressSample {
                processed_time_ms: 6500,
                output_size_bytes: 262144,
            }))
        );
    }

    #[test]
    fn test_progress_parser_ignores_negative_time_before_first_frame() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("out_time_us=-9223372036854775807"), Some(None));
        assert_eq!(parser.feed("out_time_ms=-9223372036854775807"), Some(None));
        assert_eq!(parser.feed("out_time=-577014:32:22.775808"), Some(None));
        assert_eq!(
            parser.feed("progress=continue"),
            Some(Some(ProgressSample {
                processed_time_ms: 0,
                output_size_bytes: 0,
            }))
        );
    }

    #[test]
    fn test_diagnostics_keep_the_newest_lines() {
        let engine = FfmpegEngine::new(EngineConfig {
            max_diagnostics_bytes: 4096,
            ..Default::default()
        });

        let mut buffer = String::new();
        for i in 0..3000 {
            engine.push_diagnostics(
                &mut buffer,
                &format!("[mp4 @ 0x55] Past duration 0.99 too large {}", i),
            );
        }
        engine.push_diagnostics(&mut buffer, "Conversion failed!");

        assert!(buffer.len() <= 4096);
        assert!(buffer.ends_with("too large 2999\nConversion failed!\n"));
        assert!(buffer.starts_with("[mp4 @ 0x55]"));
        assert!(!buffer.contains("too large 0\n"));
    }

    #[test]
    fn test_diagnostics_cut_inside_an_oversized_line() {
        let engine = FfmpegEngine::new(EngineConfig {
            max_diagnostics_bytes: 8,
            ..Default::default()
        });

        let mut buffer = String::new();
        engine.push_diagnostics(&mut buffer, "short");
        engine.push_diagnostics(&mut buffer, "ééééé failed");

        assert!(buffer.len() <= 8);
        assert!(buffer.ends_with("failed\n"));
    }

    #[test]
    fn test_progress_parser_passes_through_diagnostics() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("[libx264 @ 0x1] Error initializing"), None);
        assert_eq!(parser.feed("Conversion failed!"), None);
        // Sizes reported as N/A are ignored rather than treated as diagnostics.
        assert_eq!(parser.feed("total_size=N/A"), Some(None));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "test.mkv",
                "format_name": "matroska,webm",
                "duration": "7200.5",
                "size": "5000000000"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "avg_frame_rate": "24000/1001",
                    "r_frame_rate": "24000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 6
                }
            ]
        }"#;

        let probe = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(probe.duration_ms, Some(7_200_500));
        assert_eq!(probe.size_bytes, 5_000_000_000);
        assert_eq!(probe.width, Some(1920));
        assert_eq!(probe.height, Some(1080));
        let fps = probe.frame_rate.unwrap();
        assert!((fps - 23.976).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_output_audio_only() {
        let json = r#"{
            "format": {
                "format_name": "flac",
                "duration": "180.5",
                "size": "30000000"
            },
            "streams": [
                { "codec_type": "audio", "codec_name": "flac" }
            ]
        }"#;

        let probe = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(probe.duration_ms, Some(180_500));
        assert_eq!(probe.width, None);
        assert_eq!(probe.frame_rate, None);
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_r_frame_rate() {
        let json = r#"{
            "format": { "size": "1000" },
            "streams": [
                {
                    "codec_type": "video",
                    "width": 641,
                    "height": 481,
                    "avg_frame_rate": "0/0",
                    "r_frame_rate": "30/1"
                }
            ]
        }"#;

        let probe = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(probe.duration_ms, None);
        assert_eq!(probe.frame_rate, Some(30.0));
    }

    #[test]
    fn test_parse_probe_output_invalid_json() {
        let result = FfmpegEngine::parse_probe_output("not json");
        assert!(matches!(result, Err(EngineError::ParseError { .. })));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_reports_failure() {
        let engine = FfmpegEngine::new(EngineConfig::with_paths(
            "/nonexistent/ffmpeg".into(),
            "/nonexistent/ffprobe".into(),
        ));
        let (tx, mut rx) = mpsc::channel(4);
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        engine.execute("-i a.mp4 b.mp4".to_string(), tx, cancel_rx).await;

        match rx.recv().await.unwrap() {
            EngineEvent::Finished { outcome, output } => {
                assert_eq!(outcome, EngineOutcome::Failed { code: None });
                assert!(output.contains("FFmpeg not found"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let engine = FfmpegEngine::with_defaults();
        let result = engine.probe(Path::new("/nonexistent/input.mp4")).await;
        assert!(matches!(result, Err(EngineError::InputNotFound { .. })));
    }
}
