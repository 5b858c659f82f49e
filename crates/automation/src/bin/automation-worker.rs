//! automation-worker: runs evaluation passes on a fixed interval.
//!
//! Collaborators are the in-memory implementations, optionally seeded from a
//! YAML fixture. Alerts go through the channel dispatcher built from config.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use adpilot_automation::{
    ActionExecutor, EvaluationLoop, Fixture, InMemoryCampaigns, InMemorySnapshots,
    PassCancellation,
};
use adpilot_core::config::{load_dotenv, Config};
use adpilot_notify::{Dispatcher, TemplateRenderer};
use adpilot_rules::{InMemoryRuleStore, RuleLimits, RuleService};

// ── CLI ─────────────────────────────────────────────────────────────

/// Campaign automation worker: evaluates rules and executes their actions.
#[derive(Parser, Debug)]
#[command(name = "automation-worker", version, about)]
struct Cli {
    /// YAML fixture with campaigns, snapshots and rules to seed.
    #[arg(long, env = "AUTOMATION_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Run a single pass, print the batch result as JSON and exit.
    #[arg(long, env = "AUTOMATION_ONCE", default_value_t = false)]
    once: bool,

    /// Seconds between passes (defaults to AUTOMATION_INTERVAL_SECS).
    #[arg(long)]
    interval: Option<u64>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let rule_store = InMemoryRuleStore::new();
    let campaigns = InMemoryCampaigns::new();
    let snapshots = InMemorySnapshots::new();
    let service = RuleService::with_limits(
        Arc::new(rule_store.clone()),
        RuleLimits {
            name_max_len: config.automation.rule_name_max_len,
        },
    );

    if let Some(path) = &cli.fixtures {
        let summary = Fixture::load(path)
            .with_context(|| format!("loading fixture {}", path.display()))?
            .seed(&campaigns, &snapshots, &service)
            .await
            .context("seeding fixture")?;
        info!(
            campaigns = summary.campaigns,
            snapshots = summary.snapshots,
            rules = summary.rules,
            rejected = summary.rejected,
            "fixture seeded"
        );
    }

    let dispatcher = Dispatcher::from_config(&config.notify).context("building dispatcher")?;
    let renderer =
        TemplateRenderer::from_config(&config.notify).context("loading alert templates")?;
    let executor = ActionExecutor::new(
        Arc::new(campaigns.clone()),
        Arc::new(dispatcher),
        &config.automation,
        config.notify.default_channel.clone(),
    )
    .with_renderer(renderer);
    let engine = EvaluationLoop::new(
        Arc::new(rule_store),
        Arc::new(campaigns),
        Arc::new(snapshots),
        executor,
        &config.automation,
    );

    if cli.once {
        let result = engine.evaluate_all().await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let cancel = PassCancellation::new();
    let shutdown = Arc::new(Notify::new());
    {
        let cancel = cancel.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, finishing in-flight rules");
                cancel.cancel();
                shutdown.notify_waiters();
            }
        });
    }

    let interval = pass_interval(cli.interval, config.automation.pass_interval)?;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = interval.as_secs(), "automation-worker starting");
    while !cancel.is_cancelled() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.notified() => break,
        }
        if let Err(e) = engine.evaluate_all_at(Utc::now(), &cancel).await {
            error!(error = %e, "evaluation pass failed");
        }
    }

    info!("automation-worker exited cleanly");
    Ok(())
}

/// Resolve the tick period. A zero `--interval` is rejected.
fn pass_interval(flag: Option<u64>, configured: Duration) -> anyhow::Result<Duration> {
    match flag {
        Some(0) => anyhow::bail!("--interval must be at least 1 second"),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(configured),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_flag_is_rejected() {
        let configured = Duration::from_secs(300);
        assert!(pass_interval(Some(0), configured).is_err());
        assert_eq!(pass_interval(Some(5), configured).unwrap(), Duration::from_secs(5));
        assert_eq!(pass_interval(None, configured).unwrap(), configured);
    }
}
