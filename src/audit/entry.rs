//! Audit record types.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// A single audit record.
///
/// Carries the outcome of one request together with a sanitized view of
/// that request. Never holds the shared secret or a raw signature.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// RFC 3339 timestamp when the record was created.
    pub timestamp: String,
    /// Unique identifier for the request.
    pub request_id: Uuid,
    pub level: AuditLevel,
    /// Human-readable summary, identical to what the caller was told.
    pub message: String,
    /// Machine-readable outcome code (e.g. `SIGNATURE_MISMATCH`, `SENT`).
    pub code: String,
    /// HTTP status returned to the caller.
    pub status: u16,
    /// Provider message id, for sent messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Internal failure detail for operators, already scrubbed of the
    /// shared secret. Never shown to the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Request headers and body with secrets redacted.
    pub sanitized_request: serde_json::Value,
}

impl AuditRecord {
    fn new(
        level: AuditLevel,
        request_id: Uuid,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        sanitized_request: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            level,
            message: message.into(),
            code: code.into(),
            status,
            message_id: None,
            detail: None,
            sanitized_request,
        }
    }

    /// Record for a request turned away by validation. Always warning level.
    pub fn rejection(
        request_id: Uuid,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        sanitized_request: serde_json::Value,
    ) -> Self {
        Self::new(
            AuditLevel::Warn,
            request_id,
            status,
            code,
            message,
            sanitized_request,
        )
    }

    /// Record for a delivery the provider refused or that failed unexpectedly.
    pub fn delivery_failure(
        level: AuditLevel,
        request_id: Uuid,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        sanitized_request: serde_json::Value,
    ) -> Self {
        Self::new(level, request_id, status, code, message, sanitized_request)
    }

    /// Attach operator-facing detail. Callers redact it first.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Record for a message accepted by the provider.
    pub fn sent(request_id: Uuid, message_id: String, sanitized_request: serde_json::Value) -> Self {
        let mut record = Self::new(
            AuditLevel::Info,
            request_id,
            200,
            "SENT",
            "Email sent",
            sanitized_request,
        );
        record.message_id = Some(message_id);
        record
    }
}
