//! Ordered validation of inbound send requests.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::audit::{redact_detail, sanitize_request, AuditRecord, AuditSink};
use crate::auth::{AuthDecision, Authenticator, Clock, SharedSecret};
use crate::config::Settings;
use crate::error::ClientError;
use crate::protocol::{error_response, EmailCommand, InboundRequest, REQUIRED_FIELDS};

/// Limits and defaults the guard applies to every request.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub max_payload_bytes: usize,
    /// `From` address stamped on every command.
    pub default_sender: String,
}

impl GuardConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_payload_bytes: settings.security.max_email_payload_bytes,
            default_sender: settings.email.sender.clone(),
        }
    }
}

/// Why a request was turned away, in HTTP terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRejection {
    pub status: StatusCode,
    /// Caller-safe message.
    pub message: String,
    pub error: ClientError,
}

impl From<ClientError> for GuardRejection {
    fn from(error: ClientError) -> Self {
        Self {
            status: error.status(),
            message: error.to_string(),
            error,
        }
    }
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        error_response(self.status, self.message)
    }
}

/// Admission control for send requests.
///
/// Holds only immutable state, so a single instance behind an `Arc` serves
/// every concurrent request.
pub struct RequestGuard {
    authenticator: Authenticator,
    secret: SharedSecret,
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AuditSink>,
}

impl RequestGuard {
    pub fn new(
        secret: &SharedSecret,
        config: GuardConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            authenticator: Authenticator::new(secret),
            secret: secret.clone(),
            config,
            clock,
            sink,
        }
    }

    /// Largest body the guard admits.
    pub fn max_payload_bytes(&self) -> usize {
        self.config.max_payload_bytes
    }

    /// Scrub the shared secret from diagnostic text bound for the audit trail.
    pub fn redact_detail(&self, text: &str) -> String {
        redact_detail(text, &self.secret)
    }

    /// Validate a request and build the email command it asks for.
    ///
    /// Checks, in order, stopping at the first failure:
    /// 1. Payload size (before anything is parsed)
    /// 2. Signature and timestamp
    /// 3. Required body fields, in the order `recipients`, `subject`, `body`
    pub fn handle(&self, request: &InboundRequest) -> Result<EmailCommand, GuardRejection> {
        self.run_checks(request)
            .map_err(|error| self.reject(request, error))
    }

    fn run_checks(&self, request: &InboundRequest) -> Result<EmailCommand, ClientError> {
        self.check_size(request)?;
        self.check_auth(request)?;
        self.build_command(&request.body)
    }

    fn check_size(&self, request: &InboundRequest) -> Result<(), ClientError> {
        let max = self.config.max_payload_bytes;
        let declared_too_large = request
            .declared_length()
            .is_some_and(|len| len > max as u64);

        if !request.body_read || declared_too_large || request.body.len() > max {
            return Err(ClientError::OversizedPayload);
        }
        Ok(())
    }

    fn check_auth(&self, request: &InboundRequest) -> Result<(), ClientError> {
        match self
            .authenticator
            .verify(&request.headers, &request.body, self.clock.now())
        {
            AuthDecision::Accepted => Ok(()),
            AuthDecision::Rejected { reason, .. } => Err(ClientError::Auth(reason)),
        }
    }

    fn build_command(&self, body: &[u8]) -> Result<EmailCommand, ClientError> {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return Err(ClientError::InvalidBody);
        };

        if let Some(field) = REQUIRED_FIELDS.into_iter().find(|f| !fields.contains_key(*f)) {
            return Err(ClientError::MissingField { field });
        }

        let recipients = match &fields["recipients"] {
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>(),
            _ => None,
        }
        .ok_or(ClientError::InvalidField {
            field: "recipients",
        })?;

        let subject = string_field(&fields["subject"], "subject")?;
        let body = string_field(&fields["body"], "body")?;

        Ok(EmailCommand {
            sender: self.config.default_sender.clone(),
            recipients,
            subject,
            body,
        })
    }

    fn reject(&self, request: &InboundRequest, error: ClientError) -> GuardRejection {
        let rejection = GuardRejection::from(error);
        self.sink.record(&AuditRecord::rejection(
            request.request_id,
            rejection.status.as_u16(),
            error.code(),
            rejection.message.clone(),
            sanitize_request(&request.headers, request.body_if_read()),
        ));
        rejection
    }
}

fn string_field(value: &Value, field: &'static str) -> Result<String, ClientError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ClientError::InvalidField { field })
}
