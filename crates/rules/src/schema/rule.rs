//! The automation rule entity.
//!
//! A [`Rule`] is an immutable value: every update returns a new instance, so
//! concurrent evaluators can share clones freely. Persistence assigns the
//! `version` used for optimistic concurrency.

use adpilot_core::{new_rule_id, CampaignId, RuleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::RuleAction;
use super::condition::Condition;
use super::kind::RuleType;
use crate::error::{Result, RuleError};
use crate::snapshot::MetricSnapshot;

/// Default maximum rule name length, in characters.
pub const DEFAULT_NAME_MAX_LEN: usize = 100;

/// Validation limits applied when building or patching rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleLimits {
    pub name_max_len: usize,
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self {
            name_max_len: DEFAULT_NAME_MAX_LEN,
        }
    }
}

/// An automation rule attached to one campaign and owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    id: RuleId,
    campaign_id: CampaignId,
    user_id: UserId,
    name: String,
    rule_type: RuleType,
    conditions: Vec<Condition>,
    actions: Vec<RuleAction>,
    is_enabled: bool,
    cooldown_minutes: i64,
    last_triggered_at: Option<DateTime<Utc>>,
    trigger_count: u64,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for creating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub campaign_id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub rule_type: RuleType,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub cooldown_minutes: i64,
}

impl NewRule {
    /// Validate and build an enabled rule with no trigger history.
    pub fn build(self, limits: &RuleLimits) -> Result<Rule> {
        let name = validate_name(&self.name, limits)?;
        validate_conditions(&self.conditions)?;
        validate_actions(&self.actions)?;
        validate_cooldown(self.cooldown_minutes)?;
        if self.campaign_id.trim().is_empty() {
            return Err(RuleError::Validation("campaignId must not be empty".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(RuleError::Validation("userId must not be empty".to_string()));
        }
        Ok(Rule::assemble(
            self.campaign_id,
            self.user_id,
            name,
            self.rule_type,
            self.conditions,
            self.actions,
            self.cooldown_minutes,
        ))
    }
}

/// Partial update of the user-editable rule fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rule_type: Option<RuleType>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub actions: Option<Vec<RuleAction>>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub cooldown_minutes: Option<i64>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self == &RulePatch::default()
    }
}

impl Rule {
    /// Create an enabled rule with default limits.
    ///
    /// Fails when `name` is blank, `conditions` or `actions` is empty, or
    /// `cooldown_minutes` is negative.
    pub fn create(
        campaign_id: impl Into<CampaignId>,
        user_id: impl Into<UserId>,
        name: impl Into<String>,
        rule_type: RuleType,
        conditions: Vec<Condition>,
        actions: Vec<RuleAction>,
        cooldown_minutes: i64,
    ) -> Result<Rule> {
        NewRule {
            campaign_id: campaign_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            rule_type,
            conditions,
            actions,
            cooldown_minutes,
        }
        .build(&RuleLimits::default())
    }

    /// Build without validation. Callers guarantee the invariants.
    pub(crate) fn assemble(
        campaign_id: CampaignId,
        user_id: UserId,
        name: String,
        rule_type: RuleType,
        conditions: Vec<Condition>,
        actions: Vec<RuleAction>,
        cooldown_minutes: i64,
    ) -> Rule {
        let now = Utc::now();
        Rule {
            id: new_rule_id(),
            campaign_id,
            user_id,
            name,
            rule_type,
            conditions,
            actions,
            is_enabled: true,
            cooldown_minutes,
            last_triggered_at: None,
            trigger_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[RuleAction] {
        &self.actions
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn cooldown_minutes(&self) -> i64 {
        self.cooldown_minutes
    }

    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    /// Store-assigned write counter; 0 until first persisted.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// AND over all conditions. Any unavailable metric makes the rule not fire.
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds(snapshot))
    }

    /// True iff a trigger was recorded less than `cooldown_minutes` before `now`.
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            Some(last) => now.signed_duration_since(last) < self.cooldown(),
            None => false,
        }
    }

    /// Time left before the rule may fire again, if any.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let last = self.last_triggered_at?;
        let remaining = self.cooldown() - now.signed_duration_since(last);
        (remaining > chrono::Duration::zero()).then_some(remaining)
    }

    fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes)
    }

    // ── Functional updates ──────────────────────────────────────────

    /// Record a successful firing at `now`.
    ///
    /// `trigger_count` always increases by one; `last_triggered_at` never
    /// moves backwards even if `now` is older than the recorded trigger.
    pub fn record_trigger(&self, now: DateTime<Utc>) -> Rule {
        let last = match self.last_triggered_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        Rule {
            trigger_count: self.trigger_count.saturating_add(1),
            last_triggered_at: Some(last),
            updated_at: self.updated_at.max(now),
            ..self.clone()
        }
    }

    pub fn enable(&self) -> Rule {
        self.touched(Rule {
            is_enabled: true,
            ..self.clone()
        })
    }

    pub fn disable(&self) -> Rule {
        self.touched(Rule {
            is_enabled: false,
            ..self.clone()
        })
    }

    pub fn update_conditions(&self, conditions: Vec<Condition>) -> Result<Rule> {
        validate_conditions(&conditions)?;
        Ok(self.touched(Rule {
            conditions,
            ..self.clone()
        }))
    }

    pub fn update_actions(&self, actions: Vec<RuleAction>) -> Result<Rule> {
        validate_actions(&actions)?;
        Ok(self.touched(Rule {
            actions,
            ..self.clone()
        }))
    }

    pub fn rename(&self, name: &str, limits: &RuleLimits) -> Result<Rule> {
        let name = validate_name(name, limits)?;
        Ok(self.touched(Rule {
            name,
            ..self.clone()
        }))
    }

    pub fn update_cooldown(&self, cooldown_minutes: i64) -> Result<Rule> {
        validate_cooldown(cooldown_minutes)?;
        Ok(self.touched(Rule {
            cooldown_minutes,
            ..self.clone()
        }))
    }

    /// Apply every field present in `patch`, validating each.
    pub fn apply_patch(&self, patch: &RulePatch, limits: &RuleLimits) -> Result<Rule> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next = next.rename(name, limits)?;
        }
        if let Some(rule_type) = patch.rule_type {
            next = self.touched(Rule { rule_type, ..next });
        }
        if let Some(conditions) = &patch.conditions {
            next = next.update_conditions(conditions.clone())?;
        }
        if let Some(actions) = &patch.actions {
            next = next.update_actions(actions.clone())?;
        }
        if let Some(cooldown) = patch.cooldown_minutes {
            next = next.update_cooldown(cooldown)?;
        }
        match patch.is_enabled {
            Some(true) => next = next.enable(),
            Some(false) => next = next.disable(),
            None => {}
        }
        Ok(next)
    }

    /// Copy carrying the version assigned by the store.
    pub(crate) fn with_version(&self, version: u64) -> Rule {
        Rule {
            version,
            ..self.clone()
        }
    }

    fn touched(&self, next: Rule) -> Rule {
        Rule {
            updated_at: Utc::now().max(self.updated_at),
            ..next
        }
    }
}

fn validate_name(name: &str, limits: &RuleLimits) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RuleError::Validation("rule name must not be empty".to_string()));
    }
    let len = trimmed.chars().count();
    if len > limits.name_max_len {
        return Err(RuleError::Validation(format!(
            "rule name is {} characters, limit is {}",
            len, limits.name_max_len
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_conditions(conditions: &[Condition]) -> Result<()> {
    if conditions.is_empty() {
        return Err(RuleError::Validation(
            "rule must have at least one condition".to_string(),
        ));
    }
    for condition in conditions {
        condition.validate().map_err(RuleError::Validation)?;
    }
    Ok(())
}

fn validate_actions(actions: &[RuleAction]) -> Result<()> {
    if actions.is_empty() {
        return Err(RuleError::Validation(
            "rule must have at least one action".to_string(),
        ));
    }
    for action in actions {
        action.validate().map_err(RuleError::Validation)?;
    }
    Ok(())
}

fn validate_cooldown(cooldown_minutes: i64) -> Result<()> {
    if cooldown_minutes < 0 {
        return Err(RuleError::Validation(format!(
            "cooldownMinutes must be >= 0, got {}",
            cooldown_minutes
        )));
    }
    Ok(())
}
