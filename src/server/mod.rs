//! HTTP server.
//!
//! Routes:
//! - `GET /`: version banner
//! - `GET /healthcheck`: liveness probe
//! - `POST /send`: signed send request

mod listener;
mod routes;

pub use listener::{build_audit_sink, GatewayServer};
pub use routes::{router, AppState};
