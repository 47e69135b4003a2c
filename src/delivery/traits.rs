//! Email sender trait definition.

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::protocol::EmailCommand;

/// Delivers validated email commands.
///
/// Implementations may perform network I/O. Callers bound each call with a
/// timeout and may drop the future before it completes, so implementations
/// must tolerate cancellation at any await point.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Send one message, returning the provider's message id.
    async fn send(&self, command: EmailCommand) -> Result<String, DeliveryError>;
}
