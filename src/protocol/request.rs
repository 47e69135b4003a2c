//! Request types for the gateway protocol.

use axum::http::header::CONTENT_LENGTH;
use axum::http::HeaderMap;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Body fields every send request must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 3] = ["recipients", "subject", "body"];

/// The authentication-relevant view of a request.
///
/// Borrowed from the inbound headers and body; lives only as long as
/// verification does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedRequest<'a> {
    /// Exact body bytes as received, before any JSON parsing.
    pub raw_body: &'a [u8],
    /// Literal `X-Timestamp` header text.
    pub timestamp: &'a str,
    /// Hex-encoded `X-Signature` header text.
    pub signature: &'a str,
}

impl<'a> SignedRequest<'a> {
    /// Extract the signature and timestamp headers.
    ///
    /// Returns `None` if either is absent, empty, or not visible ASCII.
    pub fn from_headers(headers: &'a HeaderMap, raw_body: &'a [u8]) -> Option<Self> {
        Some(Self {
            raw_body,
            timestamp: header_text(headers, TIMESTAMP_HEADER)?,
            signature: header_text(headers, SIGNATURE_HEADER)?,
        })
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// An HTTP request as handed to the request guard.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Correlates the audit records of one request.
    pub request_id: Uuid,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// False when the transport refused to buffer the body because it
    /// exceeded the payload limit. `body` is empty in that case.
    pub body_read: bool,
}

impl InboundRequest {
    /// A request whose body was fully buffered.
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            headers,
            body: body.into(),
            body_read: true,
        }
    }

    /// A request whose body was left unread because it is too large.
    pub fn unread(headers: HeaderMap) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            headers,
            body: Bytes::new(),
            body_read: false,
        }
    }

    /// Body length announced by the client, if any and well-formed.
    pub fn declared_length(&self) -> Option<u64> {
        declared_length(&self.headers)
    }

    /// The body, if it was read.
    pub fn body_if_read(&self) -> Option<&[u8]> {
        self.body_read.then_some(self.body.as_ref())
    }
}

/// Parse the `Content-Length` header.
pub(crate) fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// A validated instruction to send one email.
///
/// Only the request guard builds these, and only for authenticated requests
/// with every required field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCommand {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}
