use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::EncodeRecord;

/// Envelope wrapping a record with the time it was emitted
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub record: EncodeRecord,
}

/// Handle for emitting encode records
///
/// Cheaply cloneable. Records are sent through a bounded channel and written
/// by the [`AuditWriter`](super::AuditWriter).
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    fn wrap(record: EncodeRecord) -> AuditEventEnvelope {
        AuditEventEnvelope {
            timestamp: Utc::now(),
            record,
        }
    }

    /// Emit a record, waiting for channel capacity
    ///
    /// A closed channel is logged, never returned to the caller.
    pub async fn emit(&self, record: EncodeRecord) {
        if let Err(e) = self.tx.send(Self::wrap(record)).await {
            tracing::error!("Failed to emit audit record: {}", e);
        }
    }

    /// Try to emit a record without waiting
    ///
    /// Returns true if the record was queued.
    pub fn try_emit(&self, record: EncodeRecord) -> bool {
        match self.tx.try_send(Self::wrap(record)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit audit record: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(input: &str) -> EncodeRecord {
        EncodeRecord {
            job_id: "job".to_string(),
            command: None,
            input_name: input.to_string(),
            output_name: None,
            success: false,
            diagnostics: "Unsupported media type".to_string(),
            input_bytes: 0,
            output_bytes: 0,
            duration_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_emit_record() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        handle.emit(record("a.txt")).await;

        let envelope = rx.recv().await.expect("Should receive record");
        assert_eq!(envelope.record.input_name, "a.txt");
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        assert!(handle.try_emit(record("a")));
        assert!(!handle.try_emit(record("b")));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<AuditEventEnvelope>(10);
        let handle = AuditHandle::new(tx);
        drop(rx);

        // Logged, not panicking
        handle.emit(record("a")).await;
        assert!(!handle.try_emit(record("b")));
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        let before = Utc::now();
        handle.try_emit(record("a"));
        let after = Utc::now();

        let envelope = rx.try_recv().expect("Should receive record");
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
