//! Routes notifications to the notifiers registered for a channel.
//!
//! A channel is a name referenced by rule actions (`notifyChannel`). Each
//! channel maps to one or more notifiers; individual notifier failures don't
//! block the others.

use std::collections::HashMap;

use adpilot_core::config::NotifyConfig;

use crate::log::LogNotifier;
use crate::traits::{DispatchResult, Notification, NotificationSink, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Dispatches notifications to named channels.
pub struct Dispatcher {
    /// Channel name → notifiers for that channel.
    channels: HashMap<String, Vec<Box<dyn Notifier>>>,
    /// Fallback notifiers used when a channel has none registered.
    default_channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    /// Create a dispatcher with a channel mapping.
    pub fn new(channels: HashMap<String, Vec<Box<dyn Notifier>>>) -> Self {
        Self {
            channels,
            default_channels: Vec::new(),
        }
    }

    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Create a dispatcher whose every channel falls back to `channels`.
    pub fn with_defaults(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            channels: HashMap::new(),
            default_channels: channels,
        }
    }

    /// Build from config: a `log` channel plus one webhook channel per entry.
    ///
    /// Unknown channels fall back to the log notifier.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::with_defaults(vec![Box::new(LogNotifier)]);
        dispatcher.set_channel("log".to_string(), vec![Box::new(LogNotifier)]);
        for (name, url) in &config.webhooks {
            let notifier = WebhookNotifier::new(url, HashMap::new())?;
            dispatcher.set_channel(name.clone(), vec![Box::new(notifier)]);
        }
        Ok(dispatcher)
    }

    /// Replace all notifiers for a channel.
    pub fn set_channel(&mut self, channel: String, notifiers: Vec<Box<dyn Notifier>>) {
        self.channels.insert(channel, notifiers);
    }

    /// Names of explicitly registered channels.
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Deliver a notification to every notifier of `channel`.
    ///
    /// Returns per-notifier results; individual failures don't block others.
    pub async fn dispatch(&self, channel: &str, notification: &Notification) -> Vec<DispatchResult> {
        let notifiers = self.channels.get(channel).unwrap_or(&self.default_channels);

        if notifiers.is_empty() {
            tracing::debug!(channel, "No notifiers configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(notifiers.len());

        for notifier in notifiers {
            let start = std::time::Instant::now();
            let result = notifier.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel,
                        notifier = notifier.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel,
                        notifier = notifier.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.to_string(),
                notifier: notifier.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[async_trait::async_trait]
impl NotificationSink for Dispatcher {
    /// Accepted when at least one notifier of the channel succeeded.
    async fn send(&self, channel: &str, notification: &Notification) -> Result<(), NotifyError> {
        let results = self.dispatch(channel, notification).await;
        if results.is_empty() {
            return Err(NotifyError::UnknownChannel(channel.to_string()));
        }
        if results.iter().any(|r| r.success) {
            return Ok(());
        }
        let errors: Vec<String> = results.into_iter().filter_map(|r| r.error).collect();
        Err(NotifyError::Delivery(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn mock(name: &str, count: &Arc<AtomicUsize>, should_fail: bool) -> Box<dyn Notifier> {
        Box::new(MockNotifier {
            name: name.to_string(),
            send_count: count.clone(),
            should_fail,
        })
    }

    fn notification() -> Notification {
        Notification::new("test", "test body")
    }

    #[tokio::test]
    async fn dispatch_to_all_notifiers() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_channel(
            "ops".to_string(),
            vec![mock("a", &count_a, false), mock("b", &count_b, false)],
        );

        let results = dispatcher.dispatch("ops", &notification()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_still_accepted() {
        let count = Arc::new(AtomicUsize::new(0));
        let unused = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_channel(
            "ops".to_string(),
            vec![mock("fail", &unused, true), mock("ok", &count, false)],
        );

        let results = dispatcher.dispatch("ops", &notification()).await;
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(NotificationSink::send(&dispatcher, "ops", &notification()).await.is_ok());
    }

    #[tokio::test]
    async fn all_failed_is_delivery_error() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_channel("ops".to_string(), vec![mock("fail", &count, true)]);

        let result = NotificationSink::send(&dispatcher, "ops", &notification()).await;
        assert!(matches!(result, Err(NotifyError::Delivery(_))));
    }

    #[tokio::test]
    async fn unknown_channel_without_defaults() {
        let dispatcher = Dispatcher::empty();
        assert!(dispatcher.dispatch("nope", &notification()).await.is_empty());
        let result = NotificationSink::send(&dispatcher, "nope", &notification()).await;
        assert!(matches!(result, Err(NotifyError::UnknownChannel(_))));
    }

    #[tokio::test]
    async fn unknown_channel_uses_defaults() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::with_defaults(vec![mock("fallback", &count, false)]);
        assert!(NotificationSink::send(&dispatcher, "anything", &notification()).await.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_config_registers_channels() {
        let mut config = NotifyConfig::default();
        config
            .webhooks
            .insert("growth".to_string(), "https://hooks.example/growth".to_string());
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.channel_names(), vec!["growth", "log"]);
    }
}
