//! Ready-made rule sets for new accounts.

use adpilot_core::{CampaignId, UserId};

use crate::schema::{Condition, Operator, Rule, RuleAction, RuleType};

/// CPA above which the e-commerce preset pauses the campaign.
pub const PRESET_MAX_CPA: f64 = 50_000.0;
/// ROAS below which the e-commerce preset cuts the budget.
pub const PRESET_MIN_ROAS: f64 = 1.5;
/// Budget cut applied by the ROAS preset, in percent.
pub const PRESET_BUDGET_CUT_PCT: f64 = 20.0;
/// Spend pace (actual / planned spend) above which the pace preset alerts.
pub const PRESET_MAX_SPEND_PACE: f64 = 1.2;

/// Three e-commerce rules, always in this order:
///
/// 1. `CPA_THRESHOLD`: `cpa > 50000` → pause the campaign (cooldown 1h)
/// 2. `ROAS_FLOOR`: `roas < 1.5` → reduce budget by 20% (cooldown 24h)
/// 3. `BUDGET_PACE`: `spend_pace > 1.2` → alert only (cooldown 6h)
///
/// `spend_pace` is not a built-in metric; the pace rule fires only when the
/// snapshot provider supplies it.
pub fn ecommerce_presets(campaign_id: &str, user_id: &str) -> Vec<Rule> {
    let campaign_id: CampaignId = campaign_id.to_string();
    let user_id: UserId = user_id.to_string();
    vec![
        Rule::assemble(
            campaign_id.clone(),
            user_id.clone(),
            "High CPA - pause campaign".to_string(),
            RuleType::CpaThreshold,
            vec![Condition::new("cpa", Operator::Gt, PRESET_MAX_CPA)],
            vec![RuleAction::PauseCampaign],
            60,
        ),
        Rule::assemble(
            campaign_id.clone(),
            user_id.clone(),
            "Low ROAS - reduce budget".to_string(),
            RuleType::RoasFloor,
            vec![Condition::new("roas", Operator::Lt, PRESET_MIN_ROAS)],
            vec![RuleAction::ReduceBudget {
                percentage: PRESET_BUDGET_CUT_PCT,
            }],
            24 * 60,
        ),
        Rule::assemble(
            campaign_id,
            user_id,
            "Overspending pace - alert".to_string(),
            RuleType::BudgetPace,
            vec![Condition::new("spend_pace", Operator::Gt, PRESET_MAX_SPEND_PACE)],
            vec![RuleAction::AlertOnly {
                notify_channel: None,
            }],
            6 * 60,
        ),
    ]
}

impl Rule {
    /// See [`ecommerce_presets`].
    pub fn ecommerce_presets(campaign_id: &str, user_id: &str) -> Vec<Rule> {
        ecommerce_presets(campaign_id, user_id)
    }
}
