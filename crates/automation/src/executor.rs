//! Turns a firing rule's action list into campaign and notification effects.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use adpilot_core::config::AutomationConfig;
use adpilot_core::{CampaignId, Money, RuleId};
use adpilot_notify::templating::{AlertContext, CampaignContext, RuleContext};
use adpilot_notify::{NotificationSink, TemplateRenderer};
use adpilot_rules::{ActionType, MetricSnapshot, Rule, RuleAction};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::campaign::{Campaign, CampaignGateway, CampaignStatus};

/// Result of executing one action of a firing rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub rule_id: RuleId,
    pub campaign_id: CampaignId,
    pub action_type: ActionType,
    /// Budget kept from being spent, in the campaign's currency.
    pub estimated_savings: f64,
    pub currency: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The action ran but a concurrent writer recorded the rule's trigger
    /// first, so this pass did not count the rule as triggered.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub lost_race: bool,
}

/// Executes rule actions through the campaign and notification collaborators.
pub struct ActionExecutor {
    campaigns: Arc<dyn CampaignGateway>,
    notifications: Arc<dyn NotificationSink>,
    renderer: TemplateRenderer,
    default_channel: String,
    min_daily_budget: f64,
    timeout: Duration,
}

struct Step {
    savings: f64,
    success: bool,
    error: Option<String>,
    campaign: Option<Campaign>,
}

impl Step {
    fn done(savings: f64, campaign: Option<Campaign>) -> Self {
        Self {
            savings,
            success: true,
            error: None,
            campaign,
        }
    }

    fn failed(error: impl fmt::Display) -> Self {
        Self {
            savings: 0.0,
            success: false,
            error: Some(error.to_string()),
            campaign: None,
        }
    }
}

impl ActionExecutor {
    pub fn new(
        campaigns: Arc<dyn CampaignGateway>,
        notifications: Arc<dyn NotificationSink>,
        config: &AutomationConfig,
        default_channel: impl Into<String>,
    ) -> Self {
        Self {
            campaigns,
            notifications,
            renderer: TemplateRenderer::new(),
            default_channel: default_channel.into(),
            min_daily_budget: config.min_daily_budget,
            timeout: config.collaborator_timeout,
        }
    }

    /// Use custom alert templates.
    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Run `rule`'s actions in listed order against `campaign`.
    ///
    /// Each action sees the campaign as left by the previous one. Failures are
    /// reported in the outcome and never stop later actions.
    pub async fn execute(
        &self,
        rule: &Rule,
        campaign: Campaign,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<ActionOutcome> {
        let mut current = campaign;
        let mut outcomes = Vec::with_capacity(rule.actions().len());

        for action in rule.actions() {
            let step = match action {
                RuleAction::PauseCampaign => self.pause(&current, snapshot).await,
                RuleAction::ReduceBudget { percentage } => {
                    self.reduce_budget(&current, *percentage).await
                }
                RuleAction::AlertOnly { notify_channel } => {
                    self.alert(rule, &current, snapshot, notify_channel.as_deref(), now)
                        .await
                }
            };

            let outcome = ActionOutcome {
                rule_id: rule.id(),
                campaign_id: current.id.clone(),
                action_type: action.action_type(),
                estimated_savings: step.savings,
                currency: current.daily_budget.currency.clone(),
                success: step.success,
                error: step.error,
                lost_race: false,
            };

            if outcome.success {
                info!(
                    rule_id = %outcome.rule_id,
                    campaign_id = %outcome.campaign_id,
                    action = %outcome.action_type,
                    savings = outcome.estimated_savings,
                    "action executed"
                );
            } else {
                warn!(
                    rule_id = %outcome.rule_id,
                    campaign_id = %outcome.campaign_id,
                    action = %outcome.action_type,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "action failed"
                );
            }

            if let Some(updated) = step.campaign {
                current = updated;
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn pause(&self, campaign: &Campaign, snapshot: &MetricSnapshot) -> Step {
        let request = self
            .campaigns
            .change_status(&campaign.id, CampaignStatus::Paused);
        match self.bounded(request).await {
            Ok(updated) => Step::done(remaining_budget(campaign, snapshot), Some(updated)),
            Err(e) => Step::failed(e),
        }
    }

    async fn reduce_budget(&self, campaign: &Campaign, percentage: f64) -> Step {
        let old = &campaign.daily_budget;
        let target = old.scaled(1.0 - percentage / 100.0).amount;
        let new_amount = target.max(self.min_daily_budget);
        if new_amount >= old.amount {
            return Step::failed(format!(
                "daily budget {old} is already at the platform minimum {:.2}",
                self.min_daily_budget
            ));
        }

        let request = self
            .campaigns
            .update_budget(&campaign.id, Money::new(new_amount, old.currency.clone()));
        match self.bounded(request).await {
            Ok(updated) => Step::done(old.amount - new_amount, Some(updated)),
            Err(e) => Step::failed(e),
        }
    }

    async fn alert(
        &self,
        rule: &Rule,
        campaign: &Campaign,
        snapshot: &MetricSnapshot,
        channel: Option<&str>,
        now: DateTime<Utc>,
    ) -> Step {
        let channel = channel.unwrap_or(&self.default_channel);
        let ctx = AlertContext {
            rule: RuleContext {
                id: rule.id().to_string(),
                name: rule.name().to_string(),
                rule_type: rule.rule_type().to_string(),
                conditions: rule.conditions().iter().map(ToString::to_string).collect(),
            },
            campaign: CampaignContext {
                id: campaign.id.clone(),
                name: campaign.name.clone(),
                status: campaign.status.to_string(),
            },
            metrics: snapshot.available_metrics(),
            now: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        let notification = match self.renderer.render_alert(&ctx) {
            Ok(n) => n.with_meta("channel", channel),
            Err(e) => return Step::failed(e),
        };

        match self.bounded(self.notifications.send(channel, &notification)).await {
            Ok(()) => Step::done(0.0, None),
            Err(e) => Step::failed(e),
        }
    }

    async fn bounded<T, E: fmt::Display>(
        &self,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }
}

/// Daily budget not yet spent, or zero when it cannot be compared.
fn remaining_budget(campaign: &Campaign, snapshot: &MetricSnapshot) -> f64 {
    campaign
        .daily_budget
        .checked_sub(&snapshot.spend)
        .map(|left| left.non_negative().amount)
        .unwrap_or(0.0)
}
