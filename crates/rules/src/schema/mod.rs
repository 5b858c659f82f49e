//! Rule definition types.
//!
//! - `Condition` / `Operator`: threshold checks against snapshot metrics
//! - `RuleAction`: tagged action payloads executed when a rule fires
//! - `RuleType`: classification tag
//! - `Rule`: the immutable rule entity and its functional updates

mod action;
mod condition;
mod kind;
mod rule;

pub use action::*;
pub use condition::*;
pub use kind::*;
pub use rule::*;

#[cfg(test)]
mod tests;
