use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Document properties (frontmatter-style key/value map).
pub type PropertyMap = serde_json::Map<String, Value>;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 3_600_000;

/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60_000;

/// Computed quality metrics for one document.
///
/// Only `refinement` is mandatory; the other metrics are optional because not
/// every document store computes them. A threshold trigger on a missing metric
/// never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub refinement: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usefulness_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_energy: Option<f64>,
}

impl DocumentState {
    pub fn with_refinement(refinement: f64) -> Self {
        Self {
            refinement,
            ..Default::default()
        }
    }

    /// Read a metric as `f64`. `None` when the metric was not supplied.
    pub fn metric(&self, property: ThresholdProperty) -> Option<f64> {
        match property {
            ThresholdProperty::Refinement => Some(self.refinement),
            ThresholdProperty::Health => self.health,
            ThresholdProperty::StubCount => self.stub_count.map(f64::from),
            ThresholdProperty::UsefulnessMargin => self.usefulness_margin,
            ThresholdProperty::PotentialEnergy => self.potential_energy,
        }
    }
}

/// Metrics a threshold trigger may compare against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdProperty {
    Refinement,
    Health,
    StubCount,
    UsefulnessMargin,
    PotentialEnergy,
}

impl ThresholdProperty {
    pub const ALL: [ThresholdProperty; 5] = [
        ThresholdProperty::Refinement,
        ThresholdProperty::Health,
        ThresholdProperty::StubCount,
        ThresholdProperty::UsefulnessMargin,
        ThresholdProperty::PotentialEnergy,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdProperty::Refinement => "refinement",
            ThresholdProperty::Health => "health",
            ThresholdProperty::StubCount => "stub_count",
            ThresholdProperty::UsefulnessMargin => "usefulness_margin",
            ThresholdProperty::PotentialEnergy => "potential_energy",
        }
    }
}

/// Numeric comparison used by threshold triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
}

impl ComparisonOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">=" => Some(ComparisonOp::Gte),
            ">" => Some(ComparisonOp::Gt),
            "<=" => Some(ComparisonOp::Lte),
            "<" => Some(ComparisonOp::Lt),
            "==" => Some(ComparisonOp::Eq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Gte => ">=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Eq => "==",
        }
    }

    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        match self {
            ComparisonOp::Gte => actual >= expected,
            ComparisonOp::Gt => actual > expected,
            ComparisonOp::Lte => actual <= expected,
            ComparisonOp::Lt => actual < expected,
            ComparisonOp::Eq => (actual - expected).abs() <= f64::EPSILON,
        }
    }
}

/// One recorded user-interaction event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: String,
    pub timestamp: Timestamp,
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn threshold_property_parse_roundtrip() {
        for p in ThresholdProperty::ALL {
            assert_eq!(ThresholdProperty::parse(p.as_str()), Some(p));
        }
        assert_eq!(ThresholdProperty::parse("sharpness"), None);
    }

    #[test]
    fn comparison_boundaries() {
        assert!(ComparisonOp::Gte.compare(0.7, 0.7));
        assert!(!ComparisonOp::Gt.compare(0.7, 0.7));
        assert!(ComparisonOp::Lte.compare(0.7, 0.7));
        assert!(!ComparisonOp::Lt.compare(0.7, 0.7));
        assert!(ComparisonOp::Eq.compare(3.0, 3.0));
        assert!(ComparisonOp::parse("!=").is_none());
    }

    #[test]
    fn missing_metrics_are_none() {
        let state = DocumentState::with_refinement(0.4);
        assert_eq!(state.metric(ThresholdProperty::Refinement), Some(0.4));
        assert_eq!(state.metric(ThresholdProperty::Health), None);

        let state = DocumentState {
            stub_count: Some(3),
            ..Default::default()
        };
        assert_eq!(state.metric(ThresholdProperty::StubCount), Some(3.0));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!("1"), &json!(1)));
        assert!(values_equal(&json!(["a"]), &json!(["a"])));
    }
}
