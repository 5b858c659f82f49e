//! Notifier traits and shared error types.

use std::collections::HashMap;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No notifiers configured for channel '{0}'")]
    UnknownChannel(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Additional metadata (rule id, campaign id, action).
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A single delivery backend (one webhook, the log, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this backend.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable backend name (e.g., "webhook", "log").
    fn channel_name(&self) -> &str;
}

/// Channel-addressed notification collaborator used by the action executor.
///
/// `Ok(())` means the message was accepted for delivery.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Result of delivering a notification to a single backend.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub notifier: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
