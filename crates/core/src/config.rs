use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub automation: AutomationConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ADPILOT_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ADPILOT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            automation: AutomationConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let a = &self.automation;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  automation:  concurrency={}, timeout={:?}, interval={:?}, window={:?}",
            a.worker_concurrency,
            a.collaborator_timeout,
            a.pass_interval,
            a.snapshot_window
        );
        tracing::info!("  budget:      min_daily_budget={}", a.min_daily_budget);
        tracing::info!(
            "  notify:      default_channel={}, webhooks=[{}]",
            self.notify.default_channel,
            self.notify.webhooks.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }
}

// ── Automation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Upper bound on rules processed concurrently within one pass.
    pub worker_concurrency: usize,
    /// Deadline applied to every collaborator call.
    pub collaborator_timeout: Duration,
    /// Interval between scheduled passes (worker binary only). Never zero.
    pub pass_interval: Duration,
    /// Lookback window requested from the snapshot provider.
    pub snapshot_window: Duration,
    /// Platform floor for a campaign's daily budget.
    pub min_daily_budget: f64,
    /// Maximum rule display-name length in characters.
    pub rule_name_max_len: usize,
}

impl AutomationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            worker_concurrency: profiled_env_usize(p, "AUTOMATION_CONCURRENCY", 8).max(1),
            collaborator_timeout: Duration::from_millis(profiled_env_u64(
                p,
                "AUTOMATION_TIMEOUT_MS",
                5_000,
            )),
            pass_interval: Duration::from_secs(
                profiled_env_u64(p, "AUTOMATION_INTERVAL_SECS", 300).max(1),
            ),
            snapshot_window: Duration::from_secs(
                profiled_env_u64(p, "AUTOMATION_WINDOW_HOURS", 24).saturating_mul(3_600),
            ),
            min_daily_budget: profiled_env_f64(p, "AUTOMATION_MIN_DAILY_BUDGET", 1_000.0),
            rule_name_max_len: profiled_env_usize(p, "RULE_NAME_MAX_LEN", 100),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 8,
            collaborator_timeout: Duration::from_millis(5_000),
            pass_interval: Duration::from_secs(300),
            snapshot_window: Duration::from_secs(24 * 3_600),
            min_daily_budget: 1_000.0,
            rule_name_max_len: 100,
        }
    }
}

// ── Notification channels ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Channel used by alert actions that do not name one.
    pub default_channel: String,
    /// Channel name → webhook URL.
    pub webhooks: BTreeMap<String, String>,
    /// Minijinja override for the alert subject.
    pub alert_subject_template: Option<String>,
    /// Minijinja override for the alert body.
    pub alert_body_template: Option<String>,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw = profiled_env_or(p, "NOTIFY_WEBHOOKS", "");
        let webhooks = match parse_channel_map(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed NOTIFY_WEBHOOKS");
                BTreeMap::new()
            }
        };
        Self {
            default_channel: profiled_env_or(p, "NOTIFY_DEFAULT_CHANNEL", "log"),
            webhooks,
            alert_subject_template: profiled_env_opt(p, "NOTIFY_ALERT_SUBJECT"),
            alert_body_template: profiled_env_opt(p, "NOTIFY_ALERT_BODY"),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            default_channel: "log".to_string(),
            webhooks: BTreeMap::new(),
            alert_subject_template: None,
            alert_body_template: None,
        }
    }
}

/// Parse `name=url,name=url` into a channel map. Blank input yields an empty map.
pub fn parse_channel_map(raw: &str) -> Result<BTreeMap<String, String>, CoreError> {
    let mut map = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, url) = pair.split_once('=').ok_or_else(|| CoreError::InvalidConfig {
            key: "NOTIFY_WEBHOOKS".to_string(),
            value: pair.to_string(),
        })?;
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(CoreError::InvalidConfig {
                key: "NOTIFY_WEBHOOKS".to_string(),
                value: pair.to_string(),
            });
        }
        map.insert(name.to_string(), url.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_channel_map_pairs() {
        let map = parse_channel_map("ops=https://a.example/hook, growth = https://b.example").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["ops"], "https://a.example/hook");
        assert_eq!(map["growth"], "https://b.example");
    }

    #[test]
    fn parse_channel_map_blank_is_empty() {
        assert!(parse_channel_map("").unwrap().is_empty());
        assert!(parse_channel_map(" , ").unwrap().is_empty());
    }

    #[test]
    fn parse_channel_map_rejects_missing_url() {
        assert!(parse_channel_map("ops").is_err());
        assert!(parse_channel_map("ops=").is_err());
    }

    #[test]
    fn automation_defaults() {
        let cfg = AutomationConfig::default();
        assert_eq!(cfg.worker_concurrency, 8);
        assert_eq!(cfg.collaborator_timeout, Duration::from_secs(5));
        assert_eq!(cfg.snapshot_window, Duration::from_secs(86_400));
    }

    #[test]
    fn degenerate_durations_are_bounded() {
        env::set_var("ZEROTICK_AUTOMATION_INTERVAL_SECS", "0");
        env::set_var("ZEROTICK_AUTOMATION_WINDOW_HOURS", u64::MAX.to_string());
        let cfg = Config::for_profile("zerotick");
        assert_eq!(cfg.automation.pass_interval, Duration::from_secs(1));
        assert_eq!(cfg.automation.snapshot_window, Duration::from_secs(u64::MAX));
        env::remove_var("ZEROTICK_AUTOMATION_INTERVAL_SECS");
        env::remove_var("ZEROTICK_AUTOMATION_WINDOW_HOURS");
    }

    #[test]
    fn alert_templates_from_profile() {
        env::set_var("TPLTEST_NOTIFY_ALERT_SUBJECT", "{{ rule.name }}");
        let cfg = Config::for_profile("tpltest");
        assert_eq!(cfg.notify.alert_subject_template.as_deref(), Some("{{ rule.name }}"));
        env::remove_var("TPLTEST_NOTIFY_ALERT_SUBJECT");
    }
}
