//! Authentication module.
//!
//! Verifies timestamp-bound HMAC-SHA256 request signatures. The signed
//! message is the literal `X-Timestamp` header text followed by the raw
//! request body:
//!
//! ```text
//! X-Signature = hex(HMAC-SHA256(secret, timestamp || body))
//! ```

mod clock;
mod hmac;
mod secret;

pub use clock::{Clock, FixedClock, SystemClock};
pub use hmac::{
    AuthDecision, Authenticator, RejectReason, REPLAY_WINDOW_SECS, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
pub use secret::SharedSecret;
