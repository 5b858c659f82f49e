//! Actions a firing rule asks the executor to perform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rule action with its variant-specific parameters.
///
/// Serialized as `{"type": ..., "params": {...}}`, e.g.
/// `{"type": "REDUCE_BUDGET", "params": {"percentage": 20}}`. `params` may be
/// omitted or empty for actions that take none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionDocument", into = "ActionDocument")]
pub enum RuleAction {
    /// Move the campaign to `paused`.
    PauseCampaign,
    /// Cut the daily budget by `percentage` percent.
    ReduceBudget { percentage: f64 },
    /// Notify a channel without touching the campaign.
    AlertOnly { notify_channel: Option<String> },
}

/// Wire form of [`RuleAction`].
#[derive(Serialize, Deserialize)]
struct ActionDocument {
    #[serde(rename = "type")]
    action_type: ActionType,
    #[serde(default, skip_serializing_if = "ActionParams::is_empty")]
    params: ActionParams,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ActionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notify_channel: Option<String>,
}

impl ActionParams {
    fn is_empty(&self) -> bool {
        self.percentage.is_none() && self.notify_channel.is_none()
    }
}

impl TryFrom<ActionDocument> for RuleAction {
    type Error = String;

    fn try_from(doc: ActionDocument) -> std::result::Result<Self, Self::Error> {
        let ActionParams {
            percentage,
            notify_channel,
        } = doc.params;
        match doc.action_type {
            ActionType::PauseCampaign => Ok(RuleAction::PauseCampaign),
            ActionType::ReduceBudget => percentage
                .map(|percentage| RuleAction::ReduceBudget { percentage })
                .ok_or_else(|| "REDUCE_BUDGET requires params.percentage".to_string()),
            ActionType::AlertOnly => Ok(RuleAction::AlertOnly { notify_channel }),
        }
    }
}

impl From<RuleAction> for ActionDocument {
    fn from(action: RuleAction) -> Self {
        let action_type = action.action_type();
        let params = match action {
            RuleAction::PauseCampaign => ActionParams::default(),
            RuleAction::ReduceBudget { percentage } => ActionParams {
                percentage: Some(percentage),
                ..ActionParams::default()
            },
            RuleAction::AlertOnly { notify_channel } => ActionParams {
                notify_channel,
                ..ActionParams::default()
            },
        };
        Self {
            action_type,
            params,
        }
    }
}

/// Discriminant of [`RuleAction`], used in outcomes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    PauseCampaign,
    ReduceBudget,
    AlertOnly,
}

impl RuleAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            RuleAction::PauseCampaign => ActionType::PauseCampaign,
            RuleAction::ReduceBudget { .. } => ActionType::ReduceBudget,
            RuleAction::AlertOnly { .. } => ActionType::AlertOnly,
        }
    }

    /// Alert to a named channel.
    pub fn alert(channel: impl Into<String>) -> Self {
        RuleAction::AlertOnly {
            notify_channel: Some(channel.into()),
        }
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        match self {
            RuleAction::PauseCampaign => Ok(()),
            RuleAction::ReduceBudget { percentage } => {
                if percentage.is_finite() && *percentage > 0.0 && *percentage <= 100.0 {
                    Ok(())
                } else {
                    Err(format!(
                        "REDUCE_BUDGET percentage must be in (0, 100], got {}",
                        percentage
                    ))
                }
            }
            RuleAction::AlertOnly { notify_channel } => match notify_channel {
                Some(channel) if channel.trim().is_empty() => {
                    Err("ALERT_ONLY notifyChannel must not be blank".to_string())
                }
                _ => Ok(()),
            },
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::PauseCampaign => write!(f, "PAUSE_CAMPAIGN"),
            ActionType::ReduceBudget => write!(f, "REDUCE_BUDGET"),
            ActionType::AlertOnly => write!(f, "ALERT_ONLY"),
        }
    }
}
