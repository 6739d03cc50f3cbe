use serde::{Deserialize, Serialize};
use serde_json::Value;
use waymark_core::Timestamp;

/// Metrics captured at one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaMilestoneSnapshot {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
    pub timestamp: Timestamp,
    /// Occurrence count of the sampled key when this was taken.
    pub occurrence: u64,
    pub session_id: String,
    #[serde(default)]
    pub metrics: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_distribution: Option<Value>,
}

impl QaMilestoneSnapshot {
    /// Snapshot with empty payloads.
    pub fn new(event_type: &str, occurrence: u64, session_id: &str, timestamp: Timestamp) -> Self {
        Self {
            event_type: event_type.to_string(),
            sub_key: None,
            timestamp,
            occurrence,
            session_id: session_id.to_string(),
            metrics: Value::Object(Default::default()),
            provider_stats: None,
            stub_distribution: None,
        }
    }

    /// Counter key this snapshot was sampled under.
    pub fn sample_key(&self) -> String {
        sample_key(&self.event_type, self.sub_key.as_deref())
    }
}

/// `event_type` or `event_type:sub_key`.
pub fn sample_key(event_type: &str, sub_key: Option<&str>) -> String {
    match sub_key {
        Some(sub) => format!("{event_type}:{sub}"),
        None => event_type.to_string(),
    }
}
