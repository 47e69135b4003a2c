//! HMAC-SHA256 request signing and verification.

use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use ring::hmac;
use subtle::ConstantTimeEq;

use crate::protocol::SignedRequest;

use super::SharedSecret;

/// Header carrying the hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Header carrying the signing time in decimal seconds since the epoch.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Largest accepted distance between the request timestamp and the local
/// clock, in either direction. The bound is inclusive.
pub const REPLAY_WINDOW_SECS: u64 = 300;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Signature or timestamp header absent, empty, or not visible ASCII.
    MissingHeaders,
    /// Timestamp unparseable or outside the replay window.
    StaleTimestamp,
    /// Signature undecodable or not equal to the expected MAC.
    SignatureMismatch,
}

impl RejectReason {
    /// Stable machine-readable code used in audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeaders => "MISSING_HEADERS",
            Self::StaleTimestamp => "STALE_TIMESTAMP",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
        }
    }

    /// Message safe to return to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingHeaders => "Missing authentication headers",
            Self::StaleTimestamp => "Request timestamp is invalid or outside the allowed window",
            Self::SignatureMismatch => "Invalid signature",
        }
    }

    /// Status this rejection maps to. Always a client error.
    pub fn status(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of verifying a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Accepted,
    Rejected {
        reason: RejectReason,
        status: StatusCode,
    },
}

impl AuthDecision {
    fn rejected(reason: RejectReason) -> Self {
        Self::Rejected {
            reason,
            status: reason.status(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Stateless verifier for signed requests.
///
/// Holds only the HMAC key derived from the shared secret, so one instance
/// can be shared across every request handler without locking.
#[derive(Clone)]
pub struct Authenticator {
    key: hmac::Key,
}

impl Authenticator {
    /// Create an authenticator keyed with the shared secret.
    pub fn new(secret: &SharedSecret) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose()),
        }
    }

    /// Verify a request's signature headers against its raw body.
    ///
    /// Checks, in order:
    /// 1. Both headers are present and non-empty
    /// 2. The timestamp is within [`REPLAY_WINDOW_SECS`] of `now`
    /// 3. The signature equals the MAC of `timestamp || body`
    ///
    /// Malformed input of any kind yields `Rejected`; this never panics.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8], now: i64) -> AuthDecision {
        match SignedRequest::from_headers(headers, body) {
            Some(request) => self.verify_signed(&request, now),
            None => AuthDecision::rejected(RejectReason::MissingHeaders),
        }
    }

    /// Verify an already-extracted signed request.
    pub fn verify_signed(&self, request: &SignedRequest<'_>, now: i64) -> AuthDecision {
        match request.timestamp.parse::<i64>() {
            Ok(ts) if ts.abs_diff(now) <= REPLAY_WINDOW_SECS => {}
            _ => return AuthDecision::rejected(RejectReason::StaleTimestamp),
        }

        let provided = match hex::decode(request.signature) {
            Ok(bytes) => bytes,
            Err(_) => return AuthDecision::rejected(RejectReason::SignatureMismatch),
        };

        let expected = self.tag(request.timestamp, request.raw_body);

        // Length is public (always 32 bytes); the contents are compared in constant time.
        if bool::from(expected.as_ref().ct_eq(provided.as_slice())) {
            AuthDecision::Accepted
        } else {
            AuthDecision::rejected(RejectReason::SignatureMismatch)
        }
    }

    /// Produce the lowercase hex signature a caller sends for `timestamp` and `body`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        hex::encode(self.tag(timestamp, body).as_ref())
    }

    fn tag(&self, timestamp: &str, body: &[u8]) -> hmac::Tag {
        let mut ctx = hmac::Context::with_key(&self.key);
        ctx.update(timestamp.as_bytes());
        ctx.update(body);
        ctx.sign()
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
