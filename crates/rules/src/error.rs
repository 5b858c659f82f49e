//! Error types shared by the rule entity, store and service.

use std::time::Duration;

use adpilot_core::RuleId;

/// Errors that can occur while building, storing or evaluating rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Malformed rule definition (empty name, no conditions, bad params, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown rule or campaign id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller does not own the rule.
    #[error("User '{user_id}' may not access rule {rule_id}")]
    Forbidden { rule_id: RuleId, user_id: String },

    /// Optimistic update lost against another writer.
    #[error("Rule {rule_id} changed concurrently (expected version {expected_version})")]
    Conflict {
        rule_id: RuleId,
        expected_version: u64,
    },

    /// A collaborator (campaign, snapshot, notification) call failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A collaborator call exceeded its deadline.
    #[error("Collaborator call timed out after {0:?}")]
    Timeout(Duration),

    /// Backing store failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RuleError {
    /// Whether the error is a per-rule transient skip during evaluation.
    pub fn is_transient(&self) -> bool {
        matches!(self, RuleError::Collaborator(_) | RuleError::Timeout(_))
    }
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
