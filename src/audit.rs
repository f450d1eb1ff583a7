//! Trade audit log
//!
//! Appends one JSON line per handled request. The log is write-only: nothing
//! reads it back to make decisions, and a failed write never fails a trade.

use crate::error::ErrorKind;
use crate::orchestrator::{TradeOutcome, TradeRequest};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Entry in the audit log
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub caller: String,
    pub op: &'static str,
    pub target: String,
    pub params: Value,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
}

impl AuditEntry {
    pub fn new(request: &TradeRequest, result: &Result<TradeOutcome>, duration_ms: u64) -> Self {
        let (outcome, error, error_kind, status) = match result {
            Ok(outcome) => (serde_json::to_value(outcome).ok(), None, None, "success"),
            Err(e) => (None, Some(e.to_string()), Some(e.kind()), "error"),
        };

        Self {
            timestamp: Utc::now(),
            request_id: request.request_id,
            caller: request.caller_id.clone(),
            op: request.op.name(),
            target: request.target.clone(),
            params: serde_json::to_value(&request.op).unwrap_or(Value::Null),
            status,
            outcome: outcome.map(strip_metadata),
            error,
            error_kind,
            duration_ms,
        }
    }
}

/// Drop raw coin metadata snapshots; they can be large and are not needed to
/// reconstruct what happened
fn strip_metadata(mut value: Value) -> Value {
    match &mut value {
        Value::Object(fields) => {
            fields.remove("metadata");
            for field in fields.values_mut() {
                *field = strip_metadata(field.take());
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                *item = strip_metadata(item.take());
            }
        }
        _ => {}
    }
    value
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Append-only JSONL log of request outcomes
#[derive(Clone)]
pub struct TradeAuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl TradeAuditLog {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    pub async fn record(&self, entry: &AuditEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(entry) {
            tracing::warn!(
                error = %e,
                path = %writer.path.display(),
                "Failed to write audit log entry"
            );
        }
    }
}
