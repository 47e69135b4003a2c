//! Dry-run sender that only logs.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::protocol::EmailCommand;

use super::EmailSender;

/// Accepts every message without delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

impl LogEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, command: EmailCommand) -> Result<String, DeliveryError> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            message_id = %message_id,
            sender = %command.sender,
            recipients = command.recipients.len(),
            subject = %command.subject,
            "Dry-run delivery, message not sent"
        );
        Ok(message_id)
    }
}
