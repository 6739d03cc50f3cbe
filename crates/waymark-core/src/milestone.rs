use crate::types::HOUR_MS;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user-configured milestone: trigger condition, snapshot action and consequences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMilestoneConfig {
    /// Unique milestone ID.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub trigger: MilestoneTrigger,
    #[serde(default)]
    pub snapshot_form: SnapshotForm,
    #[serde(default)]
    pub consequences: Vec<MilestoneConsequence>,
    #[serde(default)]
    pub scope: MilestoneScope,
    #[serde(default)]
    pub repeatable: bool,
    /// Only consulted when `repeatable` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_hours: Option<f64>,
    /// Evaluation order, ascending.
    #[serde(default)]
    pub priority: i32,
}

impl UserMilestoneConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, trigger: MilestoneTrigger) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            enabled: true,
            trigger,
            snapshot_form: SnapshotForm::default(),
            consequences: Vec::new(),
            scope: MilestoneScope::All,
            repeatable: false,
            cooldown_hours: None,
            priority: 0,
        }
    }

    /// Effective cooldown in milliseconds. `None` unless repeatable with a positive cooldown.
    pub fn cooldown_ms(&self) -> Option<i64> {
        if !self.repeatable {
            return None;
        }
        match self.cooldown_hours {
            Some(h) if h > 0.0 && h.is_finite() => Some((h * HOUR_MS as f64) as i64),
            _ => None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Condition that decides whether a milestone fires.
///
/// Threshold `property`/`operator` stay as strings so that a misconfigured
/// trigger loads fine and simply never matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MilestoneTrigger {
    Threshold {
        property: String,
        operator: String,
        value: f64,
    },
    EventCount {
        event: String,
        count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window_hours: Option<f64>,
    },
    EventSequence {
        sequence: Vec<SequenceStep>,
    },
    Composite {
        operator: CompositeOp,
        triggers: Vec<MilestoneTrigger>,
    },
}

impl MilestoneTrigger {
    pub fn type_name(&self) -> &'static str {
        match self {
            MilestoneTrigger::Threshold { .. } => "threshold",
            MilestoneTrigger::EventCount { .. } => "event_count",
            MilestoneTrigger::EventSequence { .. } => "event_sequence",
            MilestoneTrigger::Composite { .. } => "composite",
        }
    }

    pub fn threshold(property: &str, operator: &str, value: f64) -> Self {
        MilestoneTrigger::Threshold {
            property: property.to_string(),
            operator: operator.to_string(),
            value,
        }
    }
}

/// One step of an event sequence. `max_gap_minutes` bounds the gap from the previous step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceStep {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gap_minutes: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOp {
    And,
    Or,
}

/// Which documents a milestone applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MilestoneScope {
    #[default]
    All,
    /// Glob over the document path: `**` spans directories, `*` stays within one.
    Folder { pattern: String },
    /// Matches when the document carries any of `tags`.
    Tag { tags: Vec<String> },
    /// Operators: `==`, `!=`, `contains`, `exists`.
    Property {
        property: String,
        operator: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

/// Document mutation applied after a milestone fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MilestoneConsequence {
    RefinementBump {
        delta: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
    },
    PropertyEnumChange {
        property: String,
        value: Value,
    },
    ArrayMutation {
        property: String,
        operation: ArrayOperation,
        value: Value,
    },
    /// Opaque to the engine; handed to the stub mutation callback as-is.
    StubMutation {
        #[serde(default)]
        filter: Value,
        #[serde(default)]
        mutation: Value,
    },
}

impl MilestoneConsequence {
    pub fn type_name(&self) -> &'static str {
        match self {
            MilestoneConsequence::RefinementBump { .. } => "refinement_bump",
            MilestoneConsequence::PropertyEnumChange { .. } => "property_enum_change",
            MilestoneConsequence::ArrayMutation { .. } => "array_mutation",
            MilestoneConsequence::StubMutation { .. } => "stub_mutation",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArrayOperation {
    Add,
    Remove,
}

/// How to snapshot the repository when a milestone fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotForm {
    #[serde(default)]
    pub operation: SnapshotOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_template: Option<String>,
    #[serde(default)]
    pub commit_scope: CommitScope,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOperation {
    Commit,
    CommitAndPush,
    Branch,
    Tag,
    #[default]
    None,
}

/// What a commit snapshot stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitScope {
    /// Only the document that triggered the milestone.
    #[default]
    Document,
    /// Every pending change in the repository.
    All,
}
