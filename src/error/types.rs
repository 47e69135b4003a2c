//! Error types for the mail gateway.

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::RejectReason;

/// Startup and infrastructure errors.
///
/// None of these are produced while handling a request; request failures are
/// expressed as [`crate::guard::GuardRejection`] or [`DeliveryError`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP server errors (bind, serve).
    #[error("Server error: {message}")]
    Server { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failure reported by an outbound email sender.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The provider refused the message. `status` is the HTTP-like severity
    /// the gateway forwards to its caller.
    #[error("Provider rejected message (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// Anything the provider contract does not describe: transport failures,
    /// undecodable responses, timeouts.
    #[error("Unexpected delivery failure: {message}")]
    Unexpected { message: String },
}

impl DeliveryError {
    /// HTTP status the gateway answers with for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::Provider { status, .. } => *status,
            Self::Unexpected { .. } => 500,
        }
    }

    /// Whether the failure is attributable to the caller's request.
    pub fn is_caller_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

/// Ways a caller's request can fail validation. All map to 4xx statuses.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// Signature verification failed.
    #[error("{0}")]
    Auth(RejectReason),

    #[error("Payload too large")]
    OversizedPayload,

    #[error("Request body must be a JSON object")]
    InvalidBody,

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid value for field: {field}")]
    InvalidField { field: &'static str },
}

impl ClientError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(reason) => reason.status(),
            Self::OversizedPayload => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidBody | Self::MissingField { .. } | Self::InvalidField { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable machine-readable code used in audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(reason) => reason.code(),
            Self::OversizedPayload => "OVERSIZED_PAYLOAD",
            Self::InvalidBody => "INVALID_BODY",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
        }
    }
}

/// Result type alias for gateway startup operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
