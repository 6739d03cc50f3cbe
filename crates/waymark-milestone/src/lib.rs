//! Milestone orchestration: evaluates configured milestones against a
//! document, dispatches snapshot and consequence callbacks, and keeps the
//! event ledgers and triggered history that decide future firings.

pub mod actions;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod outcome;
pub mod persist;

pub use actions::{
    ActionResult, GitSnapshotExecutor, GitSnapshotResult, MilestoneCallbacks,
    PropertyChangeApplier, SnapshotRequest, StubMutationApplier,
};
pub use error::ConfigError;
pub use evaluator::{EvaluatorConfig, MilestoneEvaluator};
pub use outcome::{ConsequenceResult, MilestoneHistoryEntry, MilestoneTriggeredEvent};
pub use persist::EvaluatorExport;
