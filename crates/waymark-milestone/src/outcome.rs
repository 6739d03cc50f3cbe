use crate::actions::GitSnapshotResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use waymark_core::trigger::TriggerResult;
use waymark_core::Timestamp;

/// Result of one consequence dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsequenceResult {
    pub consequence_type: String,
    /// `true` also when no change was needed.
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsequenceResult {
    pub fn unchanged(consequence_type: &str) -> Self {
        Self {
            consequence_type: consequence_type.to_string(),
            applied: true,
            property: None,
            value: None,
            error: None,
        }
    }

    pub fn failed(consequence_type: &str, error: impl Into<String>) -> Self {
        Self {
            consequence_type: consequence_type.to_string(),
            applied: false,
            property: None,
            value: None,
            error: Some(error.into()),
        }
    }
}

/// Everything that happened when one milestone fired for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneTriggeredEvent {
    pub milestone_id: String,
    pub milestone_name: String,
    pub document_path: String,
    pub timestamp: Timestamp,
    pub trigger_result: TriggerResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_result: Option<GitSnapshotResult>,
    #[serde(default)]
    pub consequence_results: Vec<ConsequenceResult>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit record appended for each fired milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneHistoryEntry {
    pub milestone_id: String,
    pub milestone_name: String,
    pub document_path: String,
    pub timestamp: Timestamp,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_result: Option<GitSnapshotResult>,
}

impl From<&MilestoneTriggeredEvent> for MilestoneHistoryEntry {
    fn from(event: &MilestoneTriggeredEvent) -> Self {
        Self {
            milestone_id: event.milestone_id.clone(),
            milestone_name: event.milestone_name.clone(),
            document_path: event.document_path.clone(),
            timestamp: event.timestamp,
            success: event.success,
            error: event.error.clone(),
            git_result: event.git_result.clone(),
        }
    }
}
