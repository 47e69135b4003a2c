//! Audit logging module.
//!
//! Every rejected request, failed delivery and sent message produces one
//! [`AuditRecord`], handed to an [`AuditSink`]. Request handling code never
//! writes to a log stream itself.
//!
//! ## Features
//!
//! - Structured records with a sanitized view of the request
//! - Redaction of the signature header and sensitive JSON keys
//! - Truncation of large content fields
//! - JSON-lines file sink with sync for durability

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditLevel, AuditRecord};
pub use logger::{
    AuditLogger, AuditSink, FanoutAuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink,
};
pub use sanitize::{redact_detail, sanitize_params, sanitize_request};
