//! Outbound email delivery.
//!
//! The gateway hands each validated [`crate::protocol::EmailCommand`] to an
//! [`EmailSender`]. Which implementation is used comes from
//! `provider.kind` in the configuration.

mod http_sender;
mod log_sender;
mod traits;

use std::sync::Arc;

use tracing::info;

use crate::config::{ProviderKind, Settings};
use crate::error::GatewayResult;

pub use http_sender::HttpEmailSender;
pub use log_sender::LogEmailSender;
pub use traits::EmailSender;

/// Build the sender selected by the configuration.
pub fn build_sender(settings: &Settings) -> GatewayResult<Arc<dyn EmailSender>> {
    let sender: Arc<dyn EmailSender> = match settings.provider.kind {
        ProviderKind::Log => Arc::new(LogEmailSender::new()),
        ProviderKind::Http => Arc::new(HttpEmailSender::from_config(&settings.provider)?),
    };

    info!(provider = sender.name(), "Email provider configured");

    Ok(sender)
}
