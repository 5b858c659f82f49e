//! Campaign collaborator contract and the in-memory reference implementation.
//!
//! The evaluation loop never mutates campaigns directly. It asks a
//! [`CampaignGateway`], which owns the lifecycle state machine and may refuse.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use adpilot_core::{CampaignId, Money, UserId};
use adpilot_rules::RuleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

impl CampaignStatus {
    /// Completed and archived campaigns accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Archived)
    }

    /// Whether `self -> to` is a legal lifecycle transition.
    pub fn can_transition_to(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, to) {
            (from, to) if from == to => false,
            (Draft, Active) => true,
            (Active, Paused) | (Paused, Active) => true,
            (Active, Completed) | (Paused, Completed) => true,
            (from, Archived) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Archived => "ARCHIVED",
        };
        f.write_str(s)
    }
}

/// The slice of a campaign the automation layer reads and changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    pub status: CampaignStatus,
    pub daily_budget: Money,
}

/// Errors reported by the campaign collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("Campaign not found: {0}")]
    NotFound(CampaignId),

    /// The lifecycle state machine refused the transition.
    #[error("Illegal campaign transition {from} -> {to}")]
    IllegalTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    /// Backend unreachable or failed.
    #[error("Campaign service unavailable: {0}")]
    Unavailable(String),
}

impl CampaignError {
    /// Whether the campaign refused the change (as opposed to failing).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CampaignError::IllegalTransition { .. } | CampaignError::InvalidBudget(_)
        )
    }
}

impl From<CampaignError> for RuleError {
    fn from(e: CampaignError) -> Self {
        match e {
            CampaignError::NotFound(id) => RuleError::NotFound(format!("campaign {id}")),
            other => RuleError::Collaborator(other.to_string()),
        }
    }
}

/// Campaign lookup and mutation.
#[async_trait]
pub trait CampaignGateway: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Campaign>, CampaignError>;

    /// Request a status transition. Returns the updated campaign.
    async fn change_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, CampaignError>;

    /// Replace the daily budget. Returns the updated campaign.
    async fn update_budget(&self, id: &str, budget: Money) -> Result<Campaign, CampaignError>;
}

/// Process-local campaign store enforcing the lifecycle state machine.
#[derive(Clone, Default)]
pub struct InMemoryCampaigns {
    campaigns: Arc<RwLock<HashMap<CampaignId, Campaign>>>,
}

impl InMemoryCampaigns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a campaign without any lifecycle checks.
    pub fn upsert(&self, campaign: Campaign) -> Result<(), CampaignError> {
        let mut guard = self.campaigns.write().map_err(poisoned)?;
        guard.insert(campaign.id.clone(), campaign);
        Ok(())
    }

    /// Synchronous read, handy for inspection after a pass.
    pub fn get(&self, id: &str) -> Option<Campaign> {
        self.campaigns.read().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.campaigns.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: fmt::Display>(e: E) -> CampaignError {
    CampaignError::Unavailable(format!("campaign store lock poisoned: {e}"))
}

#[async_trait]
impl CampaignGateway for InMemoryCampaigns {
    async fn get_by_id(&self, id: &str) -> Result<Option<Campaign>, CampaignError> {
        let guard = self.campaigns.read().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn change_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, CampaignError> {
        let mut guard = self.campaigns.write().map_err(poisoned)?;
        let campaign = guard
            .get_mut(id)
            .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
        if !campaign.status.can_transition_to(status) {
            return Err(CampaignError::IllegalTransition {
                from: campaign.status,
                to: status,
            });
        }
        debug!(campaign_id = id, from = %campaign.status, to = %status, "campaign status changed");
        campaign.status = status;
        Ok(campaign.clone())
    }

    async fn update_budget(&self, id: &str, budget: Money) -> Result<Campaign, CampaignError> {
        if !budget.amount.is_finite() || budget.amount < 0.0 {
            return Err(CampaignError::InvalidBudget(format!(
                "budget must be a non-negative amount, got {budget}"
            )));
        }
        let mut guard = self.campaigns.write().map_err(poisoned)?;
        let campaign = guard
            .get_mut(id)
            .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
        if campaign.status.is_terminal() {
            return Err(CampaignError::InvalidBudget(format!(
                "campaign is {}",
                campaign.status
            )));
        }
        if !campaign.daily_budget.same_currency(&budget) {
            return Err(CampaignError::InvalidBudget(format!(
                "currency {} does not match campaign currency {}",
                budget.currency, campaign.daily_budget.currency
            )));
        }
        debug!(campaign_id = id, from = %campaign.daily_budget, to = %budget, "campaign budget changed");
        campaign.daily_budget = budget;
        Ok(campaign.clone())
    }
}
