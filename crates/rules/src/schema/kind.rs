//! Rule classification tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a rule is meant to guard. Purely descriptive: evaluation is the
/// same for every type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    CpaThreshold,
    RoasFloor,
    BudgetPace,
    CreativeFatigue,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::CpaThreshold => write!(f, "CPA_THRESHOLD"),
            RuleType::RoasFloor => write!(f, "ROAS_FLOOR"),
            RuleType::BudgetPace => write!(f, "BUDGET_PACE"),
            RuleType::CreativeFatigue => write!(f, "CREATIVE_FATIGUE"),
        }
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CPA_THRESHOLD" => Ok(RuleType::CpaThreshold),
            "ROAS_FLOOR" => Ok(RuleType::RoasFloor),
            "BUDGET_PACE" => Ok(RuleType::BudgetPace),
            "CREATIVE_FATIGUE" => Ok(RuleType::CreativeFatigue),
            other => Err(format!("unknown rule type: '{}'", other)),
        }
    }
}
