//! Metric snapshot collaborator.
//!
//! Aggregation happens elsewhere; the loop only asks for the snapshot of a
//! campaign over the configured window.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use adpilot_core::CampaignId;
use adpilot_rules::{EvaluationWindow, MetricSnapshot, Result, RuleError};
use async_trait::async_trait;

/// Supplies aggregated per-campaign performance.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Aggregate for `campaign_id` over `window`, or `None` when no data exists.
    async fn get_aggregate(
        &self,
        campaign_id: &str,
        window: EvaluationWindow,
    ) -> Result<Option<MetricSnapshot>>;
}

/// Fixed snapshots keyed by campaign id. The window is ignored.
#[derive(Clone, Default)]
pub struct InMemorySnapshots {
    snapshots: Arc<RwLock<HashMap<CampaignId, MetricSnapshot>>>,
}

impl InMemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for the campaign named in `snapshot.campaign_id`.
    pub fn put(&self, snapshot: MetricSnapshot) -> Result<()> {
        let mut guard = self
            .snapshots
            .write()
            .map_err(|e| RuleError::Storage(format!("snapshot lock poisoned: {e}")))?;
        guard.insert(snapshot.campaign_id.clone(), snapshot);
        Ok(())
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshots {
    async fn get_aggregate(
        &self,
        campaign_id: &str,
        _window: EvaluationWindow,
    ) -> Result<Option<MetricSnapshot>> {
        let guard = self
            .snapshots
            .read()
            .map_err(|e| RuleError::Collaborator(format!("snapshot lock poisoned: {e}")))?;
        Ok(guard.get(campaign_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn put_then_get() {
        let provider = InMemorySnapshots::new();
        provider
            .put(MetricSnapshot::empty("c-1", "KRW"))
            .unwrap();
        let window = EvaluationWindow::ending_at(Utc::now(), Duration::from_secs(3_600));

        let found = provider.get_aggregate("c-1", window).await.unwrap();
        assert_eq!(found.unwrap().campaign_id, "c-1");
        assert!(provider.get_aggregate("c-2", window).await.unwrap().is_none());
    }
}
