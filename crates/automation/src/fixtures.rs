//! YAML fixtures for running the loop without external collaborators.
//!
//! A fixture file seeds the in-memory campaign store, snapshot provider and
//! rule store:
//!
//! ```yaml
//! campaigns:
//!   - id: c-1
//!     userId: u-1
//!     status: ACTIVE
//!     dailyBudget: { amount: 100000, currency: KRW }
//! snapshots:
//!   - campaignId: c-1
//!     conversions: 2
//!     spend: { amount: 50000, currency: KRW }
//!     revenue: { amount: 80000, currency: KRW }
//! rules:
//!   - campaignId: c-1
//!     userId: u-1
//!     name: High CPA
//!     ruleType: CPA_THRESHOLD
//!     conditions: [{ metric: cpa, operator: gt, value: 15000 }]
//!     actions: [{ type: PAUSE_CAMPAIGN }]
//! presets:
//!   - campaignId: c-1
//!     userId: u-1
//! ```

use std::fs;
use std::path::Path;

use adpilot_core::{CampaignId, UserId};
use adpilot_rules::{MetricSnapshot, NewRule, RuleError, RuleService};
use serde::Deserialize;
use tracing::{info, warn};

use crate::campaign::{Campaign, CampaignError, InMemoryCampaigns};
use crate::snapshots::InMemorySnapshots;

/// Errors raised while loading or seeding a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),
}

/// Request to install the e-commerce presets on a campaign.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSeed {
    pub campaign_id: CampaignId,
    pub user_id: UserId,
}

/// Parsed fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub snapshots: Vec<MetricSnapshot>,
    #[serde(default)]
    pub rules: Vec<NewRule>,
    #[serde(default)]
    pub presets: Vec<PresetSeed>,
}

/// Counts of what a fixture seeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub campaigns: usize,
    pub snapshots: usize,
    pub rules: usize,
    /// Rule definitions that failed validation.
    pub rejected: usize,
}

impl Fixture {
    pub fn from_yaml(input: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = fs::read_to_string(path)?;
        let fixture = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            campaigns = fixture.campaigns.len(),
            rules = fixture.rules.len(),
            "loaded fixture"
        );
        Ok(fixture)
    }

    /// Populate the collaborators. Invalid rules are reported and skipped.
    pub async fn seed(
        self,
        campaigns: &InMemoryCampaigns,
        snapshots: &InMemorySnapshots,
        rules: &RuleService,
    ) -> Result<SeedSummary, FixtureError> {
        let mut summary = SeedSummary::default();

        for campaign in self.campaigns {
            campaigns.upsert(campaign)?;
            summary.campaigns += 1;
        }
        for snapshot in self.snapshots {
            snapshots.put(snapshot)?;
            summary.snapshots += 1;
        }
        for input in self.rules {
            let name = input.name.clone();
            match rules.create_rule(input).await {
                Ok(_) => summary.rules += 1,
                Err(RuleError::Validation(msg)) => {
                    warn!(rule = %name, error = %msg, "rejected fixture rule");
                    summary.rejected += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        for preset in self.presets {
            let created = rules
                .create_presets(&preset.campaign_id, &preset.user_id)
                .await?;
            summary.rules += created.len();
        }

        Ok(summary)
    }
}
