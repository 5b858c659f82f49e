//! Threshold conditions over snapshot metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::snapshot::MetricSnapshot;

/// `eq` treats values within this fraction of the larger magnitude as equal.
pub const EQ_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Comparison applied between a metric and a condition's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Operator {
    pub fn apply(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => actual > threshold,
            Self::Gte => actual >= threshold,
            Self::Lt => actual < threshold,
            Self::Lte => actual <= threshold,
            Self::Eq => {
                let scale = actual.abs().max(threshold.abs()).max(1.0);
                (actual - threshold).abs() <= EQ_RELATIVE_TOLERANCE * scale
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Eq => "eq",
        };
        f.write_str(s)
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "gt" | ">" => Ok(Self::Gt),
            "gte" | ">=" => Ok(Self::Gte),
            "lt" | "<" => Ok(Self::Lt),
            "lte" | "<=" => Ok(Self::Lte),
            "eq" | "==" => Ok(Self::Eq),
            other => Err(format!("unknown operator: '{}'", other)),
        }
    }
}

/// A single `metric <operator> value` check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    pub operator: Operator,
    pub value: f64,
}

impl Condition {
    pub fn new(metric: impl Into<String>, operator: Operator, value: f64) -> Self {
        Self {
            metric: metric.into(),
            operator,
            value,
        }
    }

    /// Whether the condition holds for `snapshot`.
    ///
    /// An unavailable metric (unknown name, zero denominator) never holds.
    pub fn holds(&self, snapshot: &MetricSnapshot) -> bool {
        match snapshot.metric(&self.metric) {
            Some(actual) => self.operator.apply(actual, self.value),
            None => false,
        }
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.metric.trim().is_empty() {
            return Err("condition metric must not be empty".to_string());
        }
        if !self.value.is_finite() {
            return Err(format!("condition value for '{}' must be finite", self.metric));
        }
        Ok(())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.value)
    }
}
