//! Campaign automation rules.
//!
//! This crate provides:
//! - The immutable [`Rule`] entity with condition evaluation and cooldown bookkeeping
//! - Typed rule actions (pause, budget cut, alert)
//! - Metric snapshots with derived ratios (CPA, ROAS, CTR, CVR)
//! - Ready-made e-commerce presets
//! - The [`RuleRepository`] abstraction plus an in-memory store
//! - The ownership-scoped [`RuleService`] for create/list/update/delete

pub mod error;
pub mod presets;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod store;

pub use error::{Result, RuleError};
pub use schema::*;
pub use service::{ListRules, RuleService, UpdateRule};
pub use snapshot::{EvaluationWindow, MetricSnapshot};
pub use store::{InMemoryRuleStore, RuleRepository};
