//! Notifier that writes alerts to the tracing log.

use crate::traits::{Notification, Notifier, NotifyError};

/// Emits each notification as an `info` event. Used as the default channel
/// and in development setups without webhooks.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            subject = %notification.subject,
            rule_id = notification.metadata.get("rule_id").map(String::as_str).unwrap_or(""),
            campaign_id = notification.metadata.get("campaign_id").map(String::as_str).unwrap_or(""),
            "{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
