//! Channel notifier that POSTs alerts to an HTTP endpoint.
//!
//! The JSON body carries a Slack-compatible `text` field next to the
//! structured subject, body and metadata, so the same channel works for chat
//! incoming-webhooks and for custom receivers.

use std::collections::HashMap;

use serde::Serialize;

use crate::traits::{Notification, Notifier, NotifyError};

/// Posts each notification as JSON to a fixed URL.
///
/// `${NAME}` placeholders in the URL and header values are expanded from the
/// process environment once, when the notifier is built.
#[derive(Debug)]
pub struct WebhookNotifier {
    endpoint: String,
    extra_headers: Vec<(String, String)>,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    text: String,
    subject: &'a str,
    body: &'a str,
    metadata: &'a HashMap<String, String>,
}

impl<'a> From<&'a Notification> for AlertPayload<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            text: format!("*{}*\n{}", n.subject, n.body),
            subject: &n.subject,
            body: &n.body,
            metadata: &n.metadata,
        }
    }
}

impl WebhookNotifier {
    /// Build a notifier for `url`, sending `headers` with every request.
    ///
    /// Fails with [`NotifyError::Config`] on a non-http(s) URL or an
    /// unresolvable placeholder.
    pub fn new(url: &str, headers: HashMap<String, String>) -> Result<Self, NotifyError> {
        let endpoint = expand_placeholders(url)?;
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(NotifyError::Config(format!(
                "webhook url must be http(s): {endpoint}"
            )));
        }

        let mut extra_headers = headers
            .into_iter()
            .map(|(name, raw)| Ok((name, expand_placeholders(&raw)?)))
            .collect::<Result<Vec<_>, NotifyError>>()?;
        extra_headers.sort();

        Ok(Self {
            endpoint,
            extra_headers,
            http: reqwest::Client::new(),
        })
    }

    #[cfg(test)]
    fn header(&self, name: &str) -> Option<&str> {
        self.extra_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let request = self
            .extra_headers
            .iter()
            .fold(self.http.post(&self.endpoint), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
            .json(&AlertPayload::from(notification));

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = %self.endpoint, %status, "webhook accepted alert");
            return Ok(());
        }

        let detail = match response.text().await {
            Ok(text) => text,
            Err(_) => String::from("<no body>"),
        };
        tracing::warn!(endpoint = %self.endpoint, %status, detail = %detail, "webhook rejected alert");
        Err(NotifyError::Delivery(format!("HTTP {status} from webhook: {detail}")))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace every `${NAME}` in `input` with the value of env var `NAME`.
fn expand_placeholders(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unterminated placeholder in '{input}'"))
        })?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("environment variable {name} is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
