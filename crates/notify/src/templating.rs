//! Minijinja template rendering for alert messages.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use std::collections::BTreeMap;

use adpilot_core::config::NotifyConfig;

use crate::traits::{Notification, NotifyError};

/// Default subject for rule alerts.
pub const DEFAULT_ALERT_SUBJECT: &str =
    "[{{ rule.rule_type }}] {{ rule.name }} fired on campaign {{ campaign.id }}";

/// Default body for rule alerts.
pub const DEFAULT_ALERT_BODY: &str = "Rule \"{{ rule.name }}\" matched at {{ now }} \
({{ rule.conditions | join(' AND ') }}).\
{% for name, value in metrics | items %} {{ name }}={{ value | round(2) }}{% endfor %}";

/// Context data available to alert templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertContext {
    pub rule: RuleContext,
    pub campaign: CampaignContext,
    /// Metric name → value for every metric available in the snapshot.
    pub metrics: BTreeMap<String, f64>,
    /// Evaluation timestamp in ISO 8601 format.
    pub now: String,
}

/// Rule metadata exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleContext {
    pub id: String,
    pub name: String,
    pub rule_type: String,
    /// Human-readable conditions, e.g. `cpa gt 15000`.
    pub conditions: Vec<String>,
}

/// Campaign data exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CampaignContext {
    pub id: String,
    pub name: String,
    pub status: String,
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    subject_template: String,
    body_template: String,
}

impl TemplateRenderer {
    /// Renderer using the default alert templates.
    pub fn new() -> Self {
        Self {
            subject_template: DEFAULT_ALERT_SUBJECT.to_string(),
            body_template: DEFAULT_ALERT_BODY.to_string(),
        }
    }

    /// Renderer with custom templates. Both are syntax-checked up front.
    pub fn with_templates(subject: &str, body: &str) -> Result<Self, NotifyError> {
        validate(subject)?;
        validate(body)?;
        Ok(Self {
            subject_template: subject.to_string(),
            body_template: body.to_string(),
        })
    }

    /// Renderer honoring the configured template overrides. A missing
    /// override keeps the default for that part.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        match (&config.alert_subject_template, &config.alert_body_template) {
            (None, None) => Ok(Self::new()),
            (subject, body) => Self::with_templates(
                subject.as_deref().unwrap_or(DEFAULT_ALERT_SUBJECT),
                body.as_deref().unwrap_or(DEFAULT_ALERT_BODY),
            ),
        }
    }

    /// Render the alert subject and body into a [`Notification`].
    pub fn render_alert(&self, ctx: &AlertContext) -> Result<Notification, NotifyError> {
        let subject = render(&self.subject_template, ctx)?;
        let body = render(&self.body_template, ctx)?;
        Ok(Notification::new(subject, body)
            .with_meta("rule_id", ctx.rule.id.clone())
            .with_meta("campaign_id", ctx.campaign.id.clone())
            .with_meta("event", "trigger"))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a configured minijinja environment with custom filters.
fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.add_filter("round", round_filter);
    env
}

/// Render a template string with the given context.
pub fn render(template_str: &str, ctx: &AlertContext) -> Result<String, NotifyError> {
    let env = build_env();
    env.render_str(template_str, ctx)
        .map_err(|e| NotifyError::Template(e.to_string()))
}

/// Check that a template string parses without evaluating it.
pub fn validate(template_str: &str) -> Result<(), NotifyError> {
    let env = build_env();
    env.template_from_str(template_str)
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    Ok(())
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}
