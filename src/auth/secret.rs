//! Process-wide shared secret.

use std::fmt;

/// Key shared with trusted callers.
///
/// Loaded once at startup and never mutated. `Debug` is redacted so the
/// value cannot leak through logs or error messages.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes. Only the HMAC key schedule and audit redaction use this.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}
