use crate::outcome::MilestoneHistoryEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use waymark_core::events::EventCounters;
use waymark_core::{EventRecord, Timestamp};

/// Persisted evaluator state. Plain data, no behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorExport {
    #[serde(default)]
    pub event_counters: EventCounters,
    #[serde(default)]
    pub event_history: Vec<EventRecord>,
    #[serde(default)]
    pub history: Vec<MilestoneHistoryEntry>,
    #[serde(default)]
    pub last_triggered: BTreeMap<String, Timestamp>,
}

/// Load evaluator state from disk. Returns None if the file doesn't exist.
pub fn load_export(path: &Path) -> Result<Option<EvaluatorExport>> {
    waymark_store::read_json(path).with_context(|| format!("loading evaluator state: {}", path.display()))
}

/// Save evaluator state atomically.
pub fn save_export(path: &Path, export: &EvaluatorExport) -> Result<()> {
    waymark_store::write_json(path, export)
        .with_context(|| format!("saving evaluator state: {}", path.display()))
}
