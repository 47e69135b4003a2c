//! HTTP-facing request and response types.
//!
//! ## Signed requests
//!
//! `POST /send` carries two headers besides the JSON body:
//! ```text
//! X-Timestamp: <decimal seconds since the epoch>
//! X-Signature: hex(HMAC-SHA256(secret, X-Timestamp || body))
//! ```

mod request;
mod response;

pub(crate) use request::declared_length;
pub use request::{EmailCommand, InboundRequest, SignedRequest, REQUIRED_FIELDS};
pub use response::{error_response, ErrorBody, SendResponse};
