//! Ownership-scoped rule management.
//!
//! Every read and write is checked against the caller's `user_id`. Campaign
//! existence and ownership are assumed to have been verified by the campaign
//! service before `create_rule` is called.

use std::sync::Arc;

use adpilot_core::{RuleId, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RuleError};
use crate::presets::ecommerce_presets;
use crate::schema::{NewRule, Rule, RuleLimits, RulePatch};
use crate::store::RuleRepository;

/// Filter for [`RuleService::list_rules`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRules {
    pub user_id: UserId,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

/// Partial update issued by a rule owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRule {
    pub rule_id: RuleId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub patch: RulePatch,
}

/// Create/list/update/delete of rules on behalf of their owners.
#[derive(Clone)]
pub struct RuleService {
    repo: Arc<dyn RuleRepository>,
    limits: RuleLimits,
}

impl RuleService {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self::with_limits(repo, RuleLimits::default())
    }

    pub fn with_limits(repo: Arc<dyn RuleRepository>, limits: RuleLimits) -> Self {
        Self { repo, limits }
    }

    /// Validate and persist a new rule for `input.user_id`.
    pub async fn create_rule(&self, input: NewRule) -> Result<Rule> {
        let rule = input.build(&self.limits)?;
        let stored = self.repo.save(rule).await?;
        info!(
            rule_id = %stored.id(),
            user_id = %stored.user_id(),
            campaign_id = %stored.campaign_id(),
            rule_type = %stored.rule_type(),
            "rule created"
        );
        Ok(stored)
    }

    /// Persist the three e-commerce presets for a campaign.
    pub async fn create_presets(&self, campaign_id: &str, user_id: &str) -> Result<Vec<Rule>> {
        require_user(user_id)?;
        if campaign_id.trim().is_empty() {
            return Err(RuleError::Validation("campaignId must not be empty".to_string()));
        }
        let mut stored = Vec::with_capacity(3);
        for rule in ecommerce_presets(campaign_id, user_id) {
            stored.push(self.repo.save(rule).await?);
        }
        info!(campaign_id, user_id, count = stored.len(), "preset rules created");
        Ok(stored)
    }

    /// Rules owned by the caller, optionally narrowed to one campaign.
    ///
    /// Results are re-filtered by owner here regardless of what the store returns.
    pub async fn list_rules(&self, query: &ListRules) -> Result<Vec<Rule>> {
        require_user(&query.user_id)?;
        let rules = self
            .repo
            .find_by_user(&query.user_id, query.campaign_id.as_deref())
            .await?;
        Ok(rules
            .into_iter()
            .filter(|r| r.user_id() == query.user_id)
            .filter(|r| {
                query
                    .campaign_id
                    .as_deref()
                    .map_or(true, |c| r.campaign_id() == c)
            })
            .collect())
    }

    /// Fetch a single rule owned by the caller.
    pub async fn get_rule(&self, rule_id: RuleId, user_id: &str) -> Result<Rule> {
        self.owned(rule_id, user_id).await
    }

    /// Apply a partial patch to a rule owned by the caller.
    ///
    /// The write is conditional on the version read here, so a trigger recorded
    /// concurrently by an evaluation pass is never overwritten; the caller gets
    /// `Conflict` and may retry.
    pub async fn update_rule(&self, update: UpdateRule) -> Result<Rule> {
        let current = self.owned(update.rule_id, &update.user_id).await?;
        if update.patch.is_empty() {
            return Ok(current);
        }
        let next = current.apply_patch(&update.patch, &self.limits)?;
        let stored = self.repo.conditional_update(next, current.version()).await?;
        info!(rule_id = %stored.id(), user_id = %update.user_id, "rule updated");
        Ok(stored)
    }

    /// Delete a rule owned by the caller. Deleting twice yields `NotFound`.
    pub async fn delete_rule(&self, rule_id: RuleId, user_id: &str) -> Result<()> {
        self.owned(rule_id, user_id).await?;
        if !self.repo.delete(rule_id).await? {
            return Err(RuleError::NotFound(format!("rule {rule_id}")));
        }
        info!(%rule_id, user_id, "rule deleted");
        Ok(())
    }

    async fn owned(&self, rule_id: RuleId, user_id: &str) -> Result<Rule> {
        require_user(user_id)?;
        let rule = self
            .repo
            .find_by_id(rule_id)
            .await?
            .ok_or_else(|| RuleError::NotFound(format!("rule {rule_id}")))?;
        if rule.user_id() != user_id {
            return Err(RuleError::Forbidden {
                rule_id,
                user_id: user_id.to_string(),
            });
        }
        Ok(rule)
    }
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(RuleError::Validation("userId must not be empty".to_string()));
    }
    Ok(())
}
