//! One batch pass over every enabled rule.
//!
//! Rules are processed with bounded parallelism. Work on a single campaign is
//! serialized through a per-campaign lock so two rules never race the
//! campaign's state machine, and trigger bookkeeping is persisted with a
//! conditional update so overlapping passes fire a rule at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use adpilot_core::config::AutomationConfig;
use adpilot_core::CampaignId;
use adpilot_rules::{
    EvaluationWindow, MetricSnapshot, Result, Rule, RuleError, RuleRepository,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::campaign::{Campaign, CampaignGateway};
use crate::cancel::PassCancellation;
use crate::executor::{ActionExecutor, ActionOutcome};
use crate::snapshots::SnapshotProvider;

/// Summary of one pass. Built fresh on every pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Rules considered this pass (including skipped ones).
    pub evaluated_count: usize,
    /// Rules that fired; counted once per rule, not per action.
    pub triggered_count: usize,
    /// Rules skipped: cooldown, missing data, collaborator failure or lost race.
    /// Actions already executed by a rule that lost the race stay in
    /// `actions`, flagged `lostRace`.
    pub skipped_count: usize,
    pub actions: Vec<ActionOutcome>,
    pub duration_ms: u64,
}

/// Why a rule was skipped this pass.
#[derive(Debug)]
enum SkipReason {
    Cooldown,
    CampaignMissing,
    NoSnapshot,
    /// Transient collaborator failure or timeout.
    Collaborator(RuleError),
    /// Non-transient failure, e.g. the rule store rejecting a read.
    Failed(RuleError),
    /// Another writer got there first (trigger recorded, rule edited/deleted).
    LostRace(&'static str),
}

/// What happened to a single rule within a pass.
#[derive(Debug)]
enum RuleRun {
    NotStarted,
    Skipped(SkipReason),
    Quiet,
    Executed {
        outcomes: Vec<ActionOutcome>,
        triggered: bool,
    },
    /// Actions ran, then the trigger record lost to a concurrent writer.
    Superseded(Vec<ActionOutcome>),
}

impl From<RuleError> for SkipReason {
    fn from(e: RuleError) -> Self {
        if e.is_transient() {
            SkipReason::Collaborator(e)
        } else {
            SkipReason::Failed(e)
        }
    }
}

/// Per-campaign async locks shared by all passes of one loop.
#[derive(Default)]
struct CampaignLocks {
    locks: Mutex<HashMap<CampaignId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CampaignLocks {
    fn get(&self, campaign_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(campaign_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop locks nobody holds.
    fn prune(&self) {
        let mut guard = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// The evaluation and action-execution control loop.
pub struct EvaluationLoop {
    rules: Arc<dyn RuleRepository>,
    campaigns: Arc<dyn CampaignGateway>,
    snapshots: Arc<dyn SnapshotProvider>,
    executor: ActionExecutor,
    concurrency: usize,
    timeout: Duration,
    window: Duration,
    locks: CampaignLocks,
}

impl EvaluationLoop {
    pub fn new(
        rules: Arc<dyn RuleRepository>,
        campaigns: Arc<dyn CampaignGateway>,
        snapshots: Arc<dyn SnapshotProvider>,
        executor: ActionExecutor,
        config: &AutomationConfig,
    ) -> Self {
        Self {
            rules,
            campaigns,
            snapshots,
            executor,
            concurrency: config.worker_concurrency.max(1),
            timeout: config.collaborator_timeout,
            window: config.snapshot_window,
            locks: CampaignLocks::default(),
        }
    }

    /// Run one pass at the current time.
    pub async fn evaluate_all(&self) -> Result<BatchResult> {
        self.evaluate_all_at(Utc::now(), &PassCancellation::new())
            .await
    }

    /// Run one pass as of `now`.
    ///
    /// Only a failure to load the enabled rules fails the pass; every other
    /// error is contained to the rule it happened on.
    pub async fn evaluate_all_at(
        &self,
        now: DateTime<Utc>,
        cancel: &PassCancellation,
    ) -> Result<BatchResult> {
        let started = Instant::now();
        let rules = self.call(self.rules.find_all_enabled()).await.map_err(|e| {
            error!(error = %e, "failed to load enabled rules");
            e
        })?;
        debug!(count = rules.len(), "loaded enabled rules");

        let window = EvaluationWindow::ending_at(now, self.window);
        let runs: Vec<RuleRun> = stream::iter(rules)
            .map(|rule| self.run_rule(rule, now, window, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;
        self.locks.prune();

        let mut result = BatchResult::default();
        for run in runs {
            match run {
                RuleRun::NotStarted => continue,
                RuleRun::Skipped(_) => result.skipped_count += 1,
                RuleRun::Superseded(outcomes) => {
                    result.skipped_count += 1;
                    result.actions.extend(outcomes);
                }
                RuleRun::Quiet => {}
                RuleRun::Executed {
                    outcomes,
                    triggered,
                } => {
                    if triggered {
                        result.triggered_count += 1;
                    }
                    result.actions.extend(outcomes);
                }
            }
            result.evaluated_count += 1;
        }
        result.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            evaluated = result.evaluated_count,
            triggered = result.triggered_count,
            skipped = result.skipped_count,
            actions = result.actions.len(),
            duration_ms = result.duration_ms,
            cancelled = cancel.is_cancelled(),
            "evaluation pass complete"
        );
        Ok(result)
    }

    async fn run_rule(
        &self,
        rule: Rule,
        now: DateTime<Utc>,
        window: EvaluationWindow,
        cancel: &PassCancellation,
    ) -> RuleRun {
        if cancel.is_cancelled() {
            return RuleRun::NotStarted;
        }
        let run = match self.try_rule(&rule, now, window).await {
            Ok(run) => run,
            Err(e) => RuleRun::Skipped(e.into()),
        };
        if let RuleRun::Skipped(reason) = &run {
            log_skip(&rule, reason, now);
        }
        run
    }

    async fn try_rule(
        &self,
        rule: &Rule,
        now: DateTime<Utc>,
        window: EvaluationWindow,
    ) -> Result<RuleRun> {
        if rule.is_in_cooldown(now) {
            return Ok(RuleRun::Skipped(SkipReason::Cooldown));
        }

        if self.fetch_campaign(rule.campaign_id()).await?.is_none() {
            return Ok(RuleRun::Skipped(SkipReason::CampaignMissing));
        }
        let Some(snapshot) = self
            .call(self.snapshots.get_aggregate(rule.campaign_id(), window))
            .await?
        else {
            return Ok(RuleRun::Skipped(SkipReason::NoSnapshot));
        };

        if !rule.evaluate(&snapshot) {
            debug!(rule_id = %rule.id(), campaign_id = rule.campaign_id(), "conditions not met");
            return Ok(RuleRun::Quiet);
        }

        let lock = self.locks.get(rule.campaign_id());
        let _campaign_guard = lock.lock().await;
        self.fire(rule, &snapshot, now).await
    }

    /// Re-validate and execute under the campaign lock, then record the trigger.
    async fn fire(
        &self,
        seen: &Rule,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RuleRun> {
        let Some(rule) = self.call(self.rules.find_by_id(seen.id())).await? else {
            return Ok(RuleRun::Skipped(SkipReason::LostRace("rule deleted")));
        };
        if !rule.is_enabled() {
            return Ok(RuleRun::Skipped(SkipReason::LostRace("rule disabled")));
        }
        if rule.version() != seen.version() {
            return Ok(RuleRun::Skipped(SkipReason::LostRace("rule changed")));
        }
        if rule.is_in_cooldown(now) {
            return Ok(RuleRun::Skipped(SkipReason::LostRace("already triggered")));
        }
        // Earlier rules on this campaign may have changed it.
        let Some(campaign) = self.fetch_campaign(rule.campaign_id()).await? else {
            return Ok(RuleRun::Skipped(SkipReason::CampaignMissing));
        };

        let outcomes = self.executor.execute(&rule, campaign, snapshot, now).await;
        if !outcomes.iter().any(|o| o.success) {
            debug!(rule_id = %rule.id(), "no action succeeded, trigger not recorded");
            return Ok(RuleRun::Executed {
                outcomes,
                triggered: false,
            });
        }

        let fired = rule.record_trigger(now);
        match self
            .call(self.rules.conditional_update(fired, rule.version()))
            .await
        {
            Ok(stored) => {
                info!(
                    rule_id = %stored.id(),
                    campaign_id = stored.campaign_id(),
                    trigger_count = stored.trigger_count(),
                    actions = outcomes.len(),
                    "rule triggered"
                );
                Ok(RuleRun::Executed {
                    outcomes,
                    triggered: true,
                })
            }
            Err(RuleError::Conflict { .. }) => {
                warn!(
                    rule_id = %rule.id(),
                    campaign_id = rule.campaign_id(),
                    executed = outcomes.len(),
                    "trigger record lost to a concurrent writer after actions ran"
                );
                let outcomes = outcomes
                    .into_iter()
                    .map(|outcome| ActionOutcome {
                        lost_race: true,
                        ..outcome
                    })
                    .collect();
                Ok(RuleRun::Superseded(outcomes))
            }
            Err(e) => {
                error!(
                    rule_id = %rule.id(),
                    error = %e,
                    "actions executed but trigger could not be recorded"
                );
                Ok(RuleRun::Executed {
                    outcomes,
                    triggered: false,
                })
            }
        }
    }

    async fn fetch_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        self.call(self.campaigns.get_by_id(campaign_id)).await
    }

    /// Apply the collaborator deadline to a call.
    async fn call<T, E>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        E: Into<RuleError>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(RuleError::Timeout(self.timeout)),
        }
    }
}

fn log_skip(rule: &Rule, reason: &SkipReason, now: DateTime<Utc>) {
    let rule_id = rule.id();
    let campaign_id = rule.campaign_id();
    match reason {
        SkipReason::Cooldown => debug!(
            %rule_id,
            campaign_id,
            remaining_secs = rule
                .cooldown_remaining(now)
                .map(|d| d.num_seconds())
                .unwrap_or(0),
            "rule in cooldown"
        ),
        SkipReason::CampaignMissing => {
            warn!(%rule_id, campaign_id, "campaign not found, skipping rule")
        }
        SkipReason::NoSnapshot => {
            debug!(%rule_id, campaign_id, "no metric snapshot, skipping rule")
        }
        SkipReason::Collaborator(e) => {
            warn!(%rule_id, campaign_id, error = %e, "collaborator failed, skipping rule")
        }
        SkipReason::Failed(e) => {
            error!(%rule_id, campaign_id, error = %e, "rule processing failed, skipping rule")
        }
        SkipReason::LostRace(why) => {
            info!(%rule_id, campaign_id, reason = why, "lost race, skipping rule")
        }
    }
}
