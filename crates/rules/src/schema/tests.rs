//! Tests for rule schema types.

use super::*;
use crate::error::RuleError;
use crate::snapshot::MetricSnapshot;
use adpilot_core::Money;
use chrono::{Duration, TimeZone, Utc};

const RULE_YAML: &str = r#"
campaignId: c-100
userId: u-1
name: "  Pause on high CPA  "
ruleType: CPA_THRESHOLD
conditions:
  - metric: cpa
    operator: gt
    value: 15000
actions:
  - type: PAUSE_CAMPAIGN
  - type: REDUCE_BUDGET
    params:
      percentage: 25
  - type: ALERT_ONLY
    params:
      notifyChannel: ops
cooldownMinutes: 30
"#;

fn snapshot(spend: f64, conversions: u64) -> MetricSnapshot {
    MetricSnapshot {
        spend: Money::new(spend, "KRW"),
        conversions,
        ..MetricSnapshot::empty("c-100", "KRW")
    }
}

fn cpa_rule(threshold: f64, cooldown: i64) -> Rule {
    Rule::create(
        "c-100",
        "u-1",
        "cpa guard",
        RuleType::CpaThreshold,
        vec![Condition::new("cpa", Operator::Gt, threshold)],
        vec![RuleAction::PauseCampaign],
        cooldown,
    )
    .unwrap()
}

fn at(h: u32, m: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
}

// ── Deserialization ─────────────────────────────────────────────

#[test]
fn parse_new_rule_yaml() {
    let input: NewRule = serde_yaml::from_str(RULE_YAML).unwrap();
    assert_eq!(input.rule_type, RuleType::CpaThreshold);
    assert_eq!(input.cooldown_minutes, 30);
    assert_eq!(input.actions.len(), 3);
    assert_eq!(input.actions[0], RuleAction::PauseCampaign);
    assert_eq!(input.actions[1], RuleAction::ReduceBudget { percentage: 25.0 });
    assert_eq!(input.actions[2], RuleAction::alert("ops"));

    let rule = input.build(&RuleLimits::default()).unwrap();
    assert_eq!(rule.name(), "Pause on high CPA");
    assert!(rule.is_enabled());
    assert_eq!(rule.trigger_count(), 0);
    assert!(rule.last_triggered_at().is_none());
}

#[test]
fn action_json_shape() {
    let json = serde_json::to_value(RuleAction::ReduceBudget { percentage: 10.0 }).unwrap();
    assert_eq!(json["type"], "REDUCE_BUDGET");
    assert_eq!(json["params"]["percentage"], 10.0);

    let pause: RuleAction = serde_json::from_str(r#"{"type":"PAUSE_CAMPAIGN"}"#).unwrap();
    assert_eq!(pause.action_type(), ActionType::PauseCampaign);
    let json = serde_json::to_value(RuleAction::PauseCampaign).unwrap();
    assert_eq!(json, serde_json::json!({"type": "PAUSE_CAMPAIGN"}));
}

#[test]
fn actions_accept_empty_or_missing_params() {
    let pause: RuleAction =
        serde_json::from_str(r#"{"type":"PAUSE_CAMPAIGN","params":{}}"#).unwrap();
    assert_eq!(pause, RuleAction::PauseCampaign);

    let alert: RuleAction = serde_json::from_str(r#"{"type":"ALERT_ONLY"}"#).unwrap();
    assert_eq!(alert, RuleAction::AlertOnly { notify_channel: None });

    let alert: RuleAction =
        serde_json::from_str(r#"{"type":"ALERT_ONLY","params":{"notifyChannel":"ops"}}"#).unwrap();
    assert_eq!(alert, RuleAction::alert("ops"));
}

#[test]
fn reduce_budget_requires_percentage() {
    let err = serde_json::from_str::<RuleAction>(r#"{"type":"REDUCE_BUDGET","params":{}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("percentage"));
    assert!(serde_json::from_str::<RuleAction>(r#"{"type":"REDUCE_BUDGET"}"#).is_err());
    assert!(serde_json::from_str::<RuleAction>(r#"{"type":"ALERT_ONLY","params":{"chanel":"x"}}"#).is_err());
}

#[test]
fn eq_uses_relative_tolerance() {
    assert!(Operator::Eq.apply(0.1 + 0.2, 0.3));
    assert!(Operator::Eq.apply(25_000.0 * (0.1 + 0.2) / 0.3, 25_000.0));
    assert!(!Operator::Eq.apply(25_000.001, 25_000.0));
    assert!(!Operator::Eq.apply(0.0, 1e-6));
}

#[test]
fn rule_serializes_camel_case() {
    let json = serde_json::to_value(cpa_rule(1.0, 0)).unwrap();
    assert_eq!(json["campaignId"], "c-100");
    assert_eq!(json["ruleType"], "CPA_THRESHOLD");
    assert_eq!(json["triggerCount"], 0);
    assert!(json["lastTriggeredAt"].is_null());
}

#[test]
fn operator_parse_and_display() {
    assert_eq!("gte".parse::<Operator>().unwrap(), Operator::Gte);
    assert_eq!(">".parse::<Operator>().unwrap(), Operator::Gt);
    assert!("between".parse::<Operator>().is_err());
    assert_eq!(Operator::Lte.to_string(), "lte");
    assert_eq!("ROAS_FLOOR".parse::<RuleType>().unwrap(), RuleType::RoasFloor);
}

// ── Validation ──────────────────────────────────────────────────

#[test]
fn create_rejects_blank_name() {
    let err = Rule::create(
        "c",
        "u",
        "   ",
        RuleType::RoasFloor,
        vec![Condition::new("roas", Operator::Lt, 1.0)],
        vec![RuleAction::PauseCampaign],
        0,
    )
    .unwrap_err();
    assert!(matches!(err, RuleError::Validation(_)));
}

#[test]
fn create_rejects_empty_conditions_and_actions() {
    let no_conditions = Rule::create(
        "c",
        "u",
        "n",
        RuleType::RoasFloor,
        vec![],
        vec![RuleAction::PauseCampaign],
        0,
    );
    assert!(matches!(no_conditions, Err(RuleError::Validation(_))));

    let no_actions = Rule::create(
        "c",
        "u",
        "n",
        RuleType::RoasFloor,
        vec![Condition::new("roas", Operator::Lt, 1.0)],
        vec![],
        0,
    );
    assert!(matches!(no_actions, Err(RuleError::Validation(_))));
}

#[test]
fn create_rejects_negative_cooldown() {
    let err = Rule::create(
        "c",
        "u",
        "n",
        RuleType::BudgetPace,
        vec![Condition::new("spend", Operator::Gt, 1.0)],
        vec![RuleAction::PauseCampaign],
        -1,
    );
    assert!(matches!(err, Err(RuleError::Validation(_))));
}

#[test]
fn create_rejects_bad_action_params() {
    for pct in [0.0, -5.0, 100.5, f64::NAN] {
        let err = Rule::create(
            "c",
            "u",
            "n",
            RuleType::RoasFloor,
            vec![Condition::new("roas", Operator::Lt, 1.0)],
            vec![RuleAction::ReduceBudget { percentage: pct }],
            0,
        );
        assert!(matches!(err, Err(RuleError::Validation(_))), "pct {pct}");
    }

    let blank_channel = Rule::create(
        "c",
        "u",
        "n",
        RuleType::RoasFloor,
        vec![Condition::new("roas", Operator::Lt, 1.0)],
        vec![RuleAction::alert(" ")],
        0,
    );
    assert!(matches!(blank_channel, Err(RuleError::Validation(_))));
}

#[test]
fn name_length_limit() {
    let limits = RuleLimits { name_max_len: 5 };
    let rule = cpa_rule(1.0, 0);
    assert!(rule.rename("12345", &limits).is_ok());
    assert!(matches!(
        rule.rename("123456", &limits),
        Err(RuleError::Validation(_))
    ));
}

// ── Evaluation ──────────────────────────────────────────────────

#[test]
fn cpa_threshold_examples() {
    let rule = cpa_rule(15_000.0, 0);
    assert!(rule.evaluate(&snapshot(50_000.0, 2)));
    assert!(!rule.evaluate(&snapshot(20_000.0, 2)));
}

#[test]
fn zero_conversions_never_fire() {
    let rule = cpa_rule(0.0, 0);
    assert!(!rule.evaluate(&snapshot(50_000.0, 0)));
}

#[test]
fn unknown_metric_never_fires() {
    let rule = Rule::create(
        "c",
        "u",
        "typo",
        RuleType::CreativeFatigue,
        vec![Condition::new("cpx", Operator::Gte, f64::MIN)],
        vec![RuleAction::PauseCampaign],
        0,
    )
    .unwrap();
    assert!(!rule.evaluate(&snapshot(1.0, 1)));
}

#[test]
fn conditions_are_conjunctive() {
    let rule = Rule::create(
        "c",
        "u",
        "both",
        RuleType::CpaThreshold,
        vec![
            Condition::new("cpa", Operator::Gt, 10.0),
            Condition::new("conversions", Operator::Gte, 3.0),
        ],
        vec![RuleAction::PauseCampaign],
        0,
    )
    .unwrap();
    assert!(!rule.evaluate(&snapshot(100.0, 2)));
    assert!(rule.evaluate(&snapshot(100.0, 3)));
}

#[test]
fn operators_at_boundary() {
    assert!(Operator::Gte.apply(5.0, 5.0));
    assert!(Operator::Lte.apply(5.0, 5.0));
    assert!(!Operator::Gt.apply(5.0, 5.0));
    assert!(!Operator::Lt.apply(5.0, 5.0));
    assert!(Operator::Eq.apply(5.0, 5.0));
    assert!(!Operator::Eq.apply(5.1, 5.0));
}

// ── Cooldown and trigger bookkeeping ────────────────────────────

#[test]
fn cooldown_window() {
    let rule = cpa_rule(1.0, 30).record_trigger(at(10, 0));
    assert!(rule.is_in_cooldown(at(10, 0)));
    assert!(rule.is_in_cooldown(at(10, 29)));
    assert!(!rule.is_in_cooldown(at(10, 30)));
    assert_eq!(rule.cooldown_remaining(at(10, 20)), Some(Duration::minutes(10)));
    assert_eq!(rule.cooldown_remaining(at(11, 0)), None);
}

#[test]
fn zero_cooldown_never_blocks() {
    let rule = cpa_rule(1.0, 0).record_trigger(at(10, 0));
    assert!(!rule.is_in_cooldown(at(10, 0)));
}

#[test]
fn never_triggered_is_not_in_cooldown() {
    assert!(!cpa_rule(1.0, 60).is_in_cooldown(at(10, 0)));
}

#[test]
fn record_trigger_returns_new_value() {
    let original = cpa_rule(1.0, 0);
    let fired = original.record_trigger(at(9, 0));
    assert_eq!(original.trigger_count(), 0);
    assert!(original.last_triggered_at().is_none());
    assert_eq!(fired.trigger_count(), 1);
    assert_eq!(fired.last_triggered_at(), Some(at(9, 0)));
    assert_eq!(fired.id(), original.id());
}

#[test]
fn trigger_bookkeeping_is_monotonic() {
    let rule = cpa_rule(1.0, 0)
        .record_trigger(at(12, 0))
        .record_trigger(at(11, 0));
    assert_eq!(rule.trigger_count(), 2);
    assert_eq!(rule.last_triggered_at(), Some(at(12, 0)));
}

#[test]
fn enable_disable_do_not_alias() {
    let rule = cpa_rule(1.0, 0);
    let disabled = rule.disable();
    assert!(rule.is_enabled());
    assert!(!disabled.is_enabled());
    assert!(disabled.enable().is_enabled());
    assert!(disabled.updated_at() >= rule.updated_at());
}

#[test]
fn apply_patch_updates_present_fields_only() {
    let rule = cpa_rule(1.0, 0);
    let patch = RulePatch {
        name: Some("renamed".to_string()),
        is_enabled: Some(false),
        cooldown_minutes: Some(15),
        ..RulePatch::default()
    };
    let patched = rule.apply_patch(&patch, &RuleLimits::default()).unwrap();
    assert_eq!(patched.name(), "renamed");
    assert!(!patched.is_enabled());
    assert_eq!(patched.cooldown_minutes(), 15);
    assert_eq!(patched.conditions(), rule.conditions());
    assert_eq!(patched.rule_type(), RuleType::CpaThreshold);
}

#[test]
fn apply_patch_rejects_empty_conditions() {
    let rule = cpa_rule(1.0, 0);
    let patch = RulePatch {
        conditions: Some(vec![]),
        ..RulePatch::default()
    };
    assert!(matches!(
        rule.apply_patch(&patch, &RuleLimits::default()),
        Err(RuleError::Validation(_))
    ));
}
