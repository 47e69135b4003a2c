//! Request guard.
//!
//! Runs the ordered admission checks for `POST /send`:
//! size → signature → required fields. The first failure wins and
//! produces exactly one audit record.

mod request_guard;

pub use request_guard::{GuardConfig, GuardRejection, RequestGuard};
