//! Rule persistence abstraction and the in-memory store.
//!
//! Writers other than the initial `save` go through
//! [`RuleRepository::conditional_update`], which only succeeds when the
//! stored version still matches the version the caller read.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use adpilot_core::RuleId;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::schema::Rule;

/// Ownership-scoped rule storage with optimistic concurrency.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Every enabled rule across all users and campaigns.
    async fn find_all_enabled(&self) -> Result<Vec<Rule>>;

    async fn find_by_id(&self, id: RuleId) -> Result<Option<Rule>>;

    /// Rules owned by `user_id`, optionally narrowed to one campaign.
    async fn find_by_user(&self, user_id: &str, campaign_id: Option<&str>) -> Result<Vec<Rule>>;

    /// Insert a new rule. Fails with `Conflict` if the id already exists.
    async fn save(&self, rule: Rule) -> Result<Rule>;

    /// Replace the stored rule iff its version equals `expected_version`.
    ///
    /// Returns the stored value with its new version.
    async fn conditional_update(&self, rule: Rule, expected_version: u64) -> Result<Rule>;

    /// Remove a rule. Returns `false` when it did not exist.
    async fn delete(&self, id: RuleId) -> Result<bool>;
}

/// Process-local rule store backed by a `RwLock<HashMap>`.
#[derive(Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<RuleId, Rule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RuleError {
    RuleError::Storage(format!("rule store lock poisoned: {e}"))
}

fn sorted(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
    rules
}

#[async_trait]
impl RuleRepository for InMemoryRuleStore {
    async fn find_all_enabled(&self) -> Result<Vec<Rule>> {
        let guard = self.rules.read().map_err(poisoned)?;
        Ok(sorted(
            guard.values().filter(|r| r.is_enabled()).cloned().collect(),
        ))
    }

    async fn find_by_id(&self, id: RuleId) -> Result<Option<Rule>> {
        let guard = self.rules.read().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: &str, campaign_id: Option<&str>) -> Result<Vec<Rule>> {
        let guard = self.rules.read().map_err(poisoned)?;
        Ok(sorted(
            guard
                .values()
                .filter(|r| r.user_id() == user_id)
                .filter(|r| campaign_id.map_or(true, |c| r.campaign_id() == c))
                .cloned()
                .collect(),
        ))
    }

    async fn save(&self, rule: Rule) -> Result<Rule> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        if guard.contains_key(&rule.id()) {
            return Err(RuleError::Conflict {
                rule_id: rule.id(),
                expected_version: 0,
            });
        }
        let stored = rule.with_version(1);
        guard.insert(stored.id(), stored.clone());
        debug!(rule_id = %stored.id(), "rule saved");
        Ok(stored)
    }

    async fn conditional_update(&self, rule: Rule, expected_version: u64) -> Result<Rule> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        let current = guard
            .get(&rule.id())
            .ok_or_else(|| RuleError::NotFound(format!("rule {}", rule.id())))?;
        if current.version() != expected_version {
            debug!(
                rule_id = %rule.id(),
                expected_version,
                actual_version = current.version(),
                "conditional update rejected"
            );
            return Err(RuleError::Conflict {
                rule_id: rule.id(),
                expected_version,
            });
        }
        let stored = rule.with_version(expected_version + 1);
        guard.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: RuleId) -> Result<bool> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        Ok(guard.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Condition, Operator, RuleAction, RuleType};
    use chrono::Utc;

    fn rule(user: &str, campaign: &str) -> Rule {
        Rule::create(
            campaign,
            user,
            "r",
            RuleType::CpaThreshold,
            vec![Condition::new("cpa", Operator::Gt, 1.0)],
            vec![RuleAction::PauseCampaign],
            0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_version_and_rejects_duplicates() {
        let store = InMemoryRuleStore::new();
        let r = rule("u1", "c1");
        let stored = store.save(r.clone()).await.unwrap();
        assert_eq!(stored.version(), 1);
        assert!(matches!(store.save(r).await, Err(RuleError::Conflict { .. })));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn find_all_enabled_skips_disabled() {
        let store = InMemoryRuleStore::new();
        store.save(rule("u1", "c1")).await.unwrap();
        store.save(rule("u1", "c2").disable()).await.unwrap();
        let enabled = store.find_all_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].campaign_id(), "c1");
    }

    #[tokio::test]
    async fn find_by_user_filters_owner_and_campaign() {
        let store = InMemoryRuleStore::new();
        store.save(rule("u1", "shared")).await.unwrap();
        store.save(rule("u2", "shared")).await.unwrap();
        store.save(rule("u1", "other")).await.unwrap();

        let all_u1 = store.find_by_user("u1", None).await.unwrap();
        assert_eq!(all_u1.len(), 2);
        assert!(all_u1.iter().all(|r| r.user_id() == "u1"));

        let shared_u1 = store.find_by_user("u1", Some("shared")).await.unwrap();
        assert_eq!(shared_u1.len(), 1);
        assert_eq!(shared_u1[0].user_id(), "u1");
    }

    #[tokio::test]
    async fn conditional_update_succeeds_once_per_version() {
        let store = InMemoryRuleStore::new();
        let stored = store.save(rule("u1", "c1")).await.unwrap();

        let fired = stored.record_trigger(Utc::now());
        let first = store
            .conditional_update(fired.clone(), stored.version())
            .await
            .unwrap();
        assert_eq!(first.version(), 2);
        assert_eq!(first.trigger_count(), 1);

        let second = store.conditional_update(fired, stored.version()).await;
        assert!(matches!(second, Err(RuleError::Conflict { .. })));
        let current = store.find_by_id(stored.id()).await.unwrap().unwrap();
        assert_eq!(current.trigger_count(), 1);
    }

    #[tokio::test]
    async fn conditional_update_missing_rule() {
        let store = InMemoryRuleStore::new();
        let result = store.conditional_update(rule("u1", "c1"), 1).await;
        assert!(matches!(result, Err(RuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryRuleStore::new();
        let stored = store.save(rule("u1", "c1")).await.unwrap();
        assert!(store.delete(stored.id()).await.unwrap());
        assert!(!store.delete(stored.id()).await.unwrap());
        assert!(store.find_all_enabled().await.unwrap().is_empty());
    }
}
