//! Rule evaluation and action execution for campaign automation.
//!
//! This crate provides:
//! - Collaborator contracts for campaigns ([`CampaignGateway`]) and metric
//!   snapshots ([`SnapshotProvider`]), with in-memory implementations
//! - The [`ActionExecutor`], which applies pause / budget-cut / alert actions
//! - The [`EvaluationLoop`], which runs one batch pass over all enabled rules
//! - YAML fixtures used by the `automation-worker` binary

pub mod campaign;
pub mod cancel;
pub mod evaluation;
pub mod executor;
pub mod fixtures;
pub mod snapshots;

pub use campaign::{Campaign, CampaignError, CampaignGateway, CampaignStatus, InMemoryCampaigns};
pub use cancel::PassCancellation;
pub use evaluation::{BatchResult, EvaluationLoop};
pub use executor::{ActionExecutor, ActionOutcome};
pub use fixtures::{Fixture, FixtureError, SeedSummary};
pub use snapshots::{InMemorySnapshots, SnapshotProvider};
