//! Aggregated campaign performance consumed by rule conditions.
//!
//! Snapshots are produced by an external aggregation service; this module only
//! defines their shape and the derived ratios conditions may reference.

use std::collections::BTreeMap;
use std::time::Duration;

use adpilot_core::{CampaignId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time range a snapshot aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvaluationWindow {
    /// Window of `lookback` ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Self {
        let lookback = chrono::Duration::from_std(lookback).unwrap_or(chrono::Duration::zero());
        Self {
            start: end - lookback,
            end,
        }
    }
}

/// Per-campaign performance aggregate for one evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub campaign_id: CampaignId,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub link_clicks: u64,
    #[serde(default)]
    pub conversions: u64,
    pub spend: Money,
    pub revenue: Money,
    /// Additional provider-computed metrics (e.g. `spend_pace`, `frequency`).
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    /// Empty snapshot in the given currency.
    pub fn empty(campaign_id: impl Into<CampaignId>, currency: &str) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            impressions: 0,
            clicks: 0,
            link_clicks: 0,
            conversions: 0,
            spend: Money::zero(currency),
            revenue: Money::zero(currency),
            extra: BTreeMap::new(),
        }
    }

    /// Cost per acquisition: spend / conversions.
    pub fn cpa(&self) -> Option<f64> {
        ratio(self.spend.amount, self.conversions as f64)
    }

    /// Return on ad spend: revenue / spend. Unavailable across currencies.
    pub fn roas(&self) -> Option<f64> {
        if !self.revenue.same_currency(&self.spend) {
            return None;
        }
        ratio(self.revenue.amount, self.spend.amount)
    }

    /// Click-through rate: clicks / impressions.
    pub fn ctr(&self) -> Option<f64> {
        ratio(self.clicks as f64, self.impressions as f64)
    }

    /// Conversion rate: conversions / clicks.
    pub fn cvr(&self) -> Option<f64> {
        ratio(self.conversions as f64, self.clicks as f64)
    }

    /// Resolve a metric by name.
    ///
    /// Names are matched case-insensitively with `-` treated as `_`. Built-in
    /// metrics win over `extra`; `None` means the metric is unavailable
    /// (unknown name or zero denominator).
    pub fn metric(&self, name: &str) -> Option<f64> {
        let key = normalize_metric_name(name);
        let value = match key.as_str() {
            "impressions" => Some(self.impressions as f64),
            "clicks" => Some(self.clicks as f64),
            "link_clicks" | "linkclicks" => Some(self.link_clicks as f64),
            "conversions" => Some(self.conversions as f64),
            "spend" => Some(self.spend.amount),
            "revenue" => Some(self.revenue.amount),
            "cpa" => self.cpa(),
            "roas" => self.roas(),
            "ctr" => self.ctr(),
            "cvr" => self.cvr(),
            other => self.extra.get(other).copied(),
        };
        value.filter(|v| v.is_finite())
    }

    /// Every metric currently available, built-ins first then extras.
    pub fn available_metrics(&self) -> BTreeMap<String, f64> {
        const BUILT_IN: [&str; 10] = [
            "impressions",
            "clicks",
            "link_clicks",
            "conversions",
            "spend",
            "revenue",
            "cpa",
            "roas",
            "ctr",
            "cvr",
        ];
        BUILT_IN
            .iter()
            .copied()
            .map(str::to_string)
            .chain(self.extra.keys().cloned())
            .filter_map(|name| self.metric(&name).map(|v| (name, v)))
            .collect()
    }
}

pub(crate) fn normalize_metric_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
