//! Notification delivery for automation alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery backends
//! - Webhook and log notifier implementations
//! - Minijinja rendering of alert messages
//! - `Dispatcher`, which routes a message to the notifiers of a named channel

pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use templating::{AlertContext, TemplateRenderer};
pub use traits::{Notification, NotificationSink, Notifier, NotifyError};
