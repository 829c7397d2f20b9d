//! Append-only audit log of completed calls.

use crate::types::{ChatRequest, ChatResponse};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub input: ChatRequest,
    /// Provider response body as received.
    pub output: serde_json::Value,
}

/// JSON Lines audit file shared by all clients of a run.
///
/// Each entry is serialized up front and appended with a single write, so
/// concurrent writers never interleave partial lines.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    /// Log to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry, logging and swallowing any failure.
    pub fn record(&self, request_id: &str, input: &ChatRequest, output: &ChatResponse) {
        if let Err(e) = self.try_record(request_id, input, output) {
            warn!(
                path = %self.path.display(),
                request_id,
                error = %e,
                "Failed to write audit log entry"
            );
        }
    }

    /// Append an entry, returning any I/O or serialization failure.
    pub fn try_record(
        &self,
        request_id: &str,
        input: &ChatRequest,
        output: &ChatResponse,
    ) -> std::io::Result<()> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            input: input.clone(),
            output: output.audit_value(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        file.flush()
    }
}
