//! Encode records written to the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attempted file of a job.
///
/// Files that fail before the engine runs have no command and no output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeRecord {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub input_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    pub success: bool,
    /// Engine diagnostics or the reason the file was skipped.
    pub diagnostics: String,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

impl EncodeRecord {
    /// Output size relative to input size, when both are known.
    pub fn ratio(&self) -> Option<f64> {
        if self.success && self.input_bytes > 0 {
            Some(self.output_bytes as f64 / self.input_bytes as f64)
        } else {
            None
        }
    }
}

/// A stored encode record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub data: EncodeRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(success: bool) -> EncodeRecord {
        EncodeRecord {
            job_id: "job-1".to_string(),
            command: Some("-y -i \"a.mp4\" \"b.mp4\"".to_string()),
            input_name: "a.mp4".to_string(),
            output_name: Some("b.mp4".to_string()),
            success,
            diagnostics: String::new(),
            input_bytes: 1000,
            output_bytes: 250,
            duration_ms: 1200,
        }
    }

    #[test]
    fn test_ratio() {
        assert_eq!(record(true).ratio(), Some(0.25));
        assert_eq!(record(false).ratio(), None);
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let mut rec = record(false);
        rec.command = None;
        rec.output_name = None;

        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("command"));
        assert!(!json.contains("output_name"));

        let parsed: EncodeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rec);
    }
}
