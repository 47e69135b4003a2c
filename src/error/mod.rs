//! Error types for the mail gateway.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
