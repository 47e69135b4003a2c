//! Audit sinks.
//!
//! [`AuditLogger`] writes records as JSON lines (one JSON object per line)
//! for easy parsing by log analysis tools. [`TracingAuditSink`] mirrors
//! records into the process log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::error::GatewayError;

use super::entry::{AuditLevel, AuditRecord};

/// Destination for audit records.
///
/// Recording never fails from the caller's point of view; a sink that
/// cannot persist a record reports the problem through its own channel.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Logger for audit records.
///
/// Writes records to a file in JSON lines format.
/// Thread-safe via internal mutex.
pub struct AuditLogger {
    /// The file handle wrapped in a mutex for thread safety.
    file: Mutex<File>,
    /// Path to the audit log file.
    path: PathBuf,
}

impl AuditLogger {
    /// Create a new audit logger that writes to the specified path.
    ///
    /// Creates the parent directory if it doesn't exist.
    /// Opens the file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - File cannot be opened for appending
    pub fn new(path: &Path) -> Result<Self, GatewayError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Serialize the record and append it as a single line.
    ///
    /// Syncs the file after writing for durability.
    pub fn log(&self, record: &AuditRecord) -> Result<(), GatewayError> {
        let json = serde_json::to_string(record)?;

        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %record.request_id,
            code = %record.code,
            "Audit record logged"
        );

        Ok(())
    }

    /// Get the path to the audit log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for AuditLogger {
    fn record(&self, record: &AuditRecord) {
        if let Err(e) = self.log(record) {
            error!(error = %e, path = %self.path.display(), "Failed to write audit log entry");
        }
    }
}

/// Emits each record as a `tracing` event at the record's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        let request = record.sanitized_request.to_string();
        match record.level {
            AuditLevel::Info => info!(
                request_id = %record.request_id,
                code = %record.code,
                status = record.status,
                message_id = record.message_id.as_deref().unwrap_or(""),
                "{}",
                record.message
            ),
            AuditLevel::Warn => warn!(
                request_id = %record.request_id,
                code = %record.code,
                status = record.status,
                detail = record.detail.as_deref().unwrap_or(""),
                sanitized_request = %request,
                "{}",
                record.message
            ),
            AuditLevel::Error => error!(
                request_id = %record.request_id,
                code = %record.code,
                status = record.status,
                detail = record.detail.as_deref().unwrap_or(""),
                sanitized_request = %request,
                "{}",
                record.message
            ),
        }
    }
}

/// Forwards every record to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

/// A no-op sink for when audit logging is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Keeps records in memory; used by tests and embedders that inspect outcomes.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
    }
}
