use crate::milestone::{ArrayOperation, MilestoneConsequence};
use crate::types::{values_equal, DocumentState, PropertyMap};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single property write implied by a consequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: String,
    pub value: Value,
}

/// Compute the property change a consequence implies. Pure, no I/O.
///
/// `None` means the document is already in the target state; callers treat
/// that as applied. `StubMutation` always yields `None` here because stub
/// edits are delegated wholesale to the stub mutation callback.
pub fn apply_consequence(
    consequence: &MilestoneConsequence,
    state: &DocumentState,
    properties: &PropertyMap,
) -> Option<PropertyChange> {
    match consequence {
        MilestoneConsequence::RefinementBump { delta, max, min } => {
            let mut next = state.refinement + delta;
            if let Some(max) = max {
                next = next.min(*max);
            }
            if let Some(min) = min {
                next = next.max(*min);
            }
            if (next - state.refinement).abs() <= f64::EPSILON {
                return None;
            }
            Some(PropertyChange {
                property: "refinement".into(),
                value: json!(next),
            })
        }
        MilestoneConsequence::PropertyEnumChange { property, value } => {
            if properties.get(property).is_some_and(|cur| values_equal(cur, value)) {
                return None;
            }
            Some(PropertyChange {
                property: property.clone(),
                value: value.clone(),
            })
        }
        MilestoneConsequence::ArrayMutation {
            property,
            operation,
            value,
        } => {
            let mut items = array_values(properties.get(property));
            let present = items.iter().any(|v| values_equal(v, value));
            match operation {
                ArrayOperation::Add if present => return None,
                ArrayOperation::Add => items.push(value.clone()),
                ArrayOperation::Remove if !present => return None,
                ArrayOperation::Remove => items.retain(|v| !values_equal(v, value)),
            }
            Some(PropertyChange {
                property: property.clone(),
                value: Value::Array(items),
            })
        }
        MilestoneConsequence::StubMutation { .. } => None,
    }
}

/// Read a property as a list. A scalar becomes a one-element list; missing or null is empty.
fn array_values(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(delta: f64, max: Option<f64>, min: Option<f64>) -> MilestoneConsequence {
        MilestoneConsequence::RefinementBump { delta, max, min }
    }

    fn props(v: Value) -> PropertyMap {
        match v {
            Value::Object(m) => m,
            _ => PropertyMap::new(),
        }
    }

    fn tag_op(operation: ArrayOperation, value: &str) -> MilestoneConsequence {
        MilestoneConsequence::ArrayMutation {
            property: "tags".into(),
            operation,
            value: json!(value),
        }
    }

    #[test]
    fn refinement_bump_clamps_to_max() {
        let change = apply_consequence(
            &bump(0.8, Some(1.0), None),
            &DocumentState::with_refinement(0.5),
            &PropertyMap::new(),
        )
        .unwrap();
        assert_eq!(change.property, "refinement");
        assert_eq!(change.value, json!(1.0));
    }

    #[test]
    fn refinement_bump_clamps_to_min() {
        let change = apply_consequence(
            &bump(-0.5, None, Some(0.1)),
            &DocumentState::with_refinement(0.3),
            &PropertyMap::new(),
        )
        .unwrap();
        assert_eq!(change.value, json!(0.1));
    }

    #[test]
    fn refinement_bump_unclamped() {
        let change = apply_consequence(
            &bump(0.25, None, None),
            &DocumentState::with_refinement(0.5),
            &PropertyMap::new(),
        )
        .unwrap();
        assert_eq!(change.value, json!(0.75));
    }

    #[test]
    fn refinement_bump_at_cap_is_noop() {
        let out = apply_consequence(
            &bump(0.2, Some(1.0), None),
            &DocumentState::with_refinement(1.0),
            &PropertyMap::new(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn enum_change_noop_when_equal() {
        let c = MilestoneConsequence::PropertyEnumChange {
            property: "status".into(),
            value: json!("final"),
        };
        let p = props(json!({ "status": "final" }));
        assert!(apply_consequence(&c, &DocumentState::default(), &p).is_none());

        let p = props(json!({ "status": "draft" }));
        let change = apply_consequence(&c, &DocumentState::default(), &p).unwrap();
        assert_eq!(change.value, json!("final"));
    }

    #[test]
    fn array_add_present_is_noop() {
        let p = props(json!({ "tags": ["a", "polished"] }));
        assert!(apply_consequence(&tag_op(ArrayOperation::Add, "polished"), &DocumentState::default(), &p).is_none());
    }

    #[test]
    fn array_add_appends_preserving_order() {
        let p = props(json!({ "tags": ["b", "a"] }));
        let change =
            apply_consequence(&tag_op(ArrayOperation::Add, "c"), &DocumentState::default(), &p).unwrap();
        assert_eq!(change.value, json!(["b", "a", "c"]));
    }

    #[test]
    fn array_add_to_missing_or_scalar() {
        let change = apply_consequence(
            &tag_op(ArrayOperation::Add, "x"),
            &DocumentState::default(),
            &PropertyMap::new(),
        )
        .unwrap();
        assert_eq!(change.value, json!(["x"]));

        let p = props(json!({ "tags": "solo" }));
        let change =
            apply_consequence(&tag_op(ArrayOperation::Add, "x"), &DocumentState::default(), &p).unwrap();
        assert_eq!(change.value, json!(["solo", "x"]));
    }

    #[test]
    fn array_remove() {
        let p = props(json!({ "tags": ["a", "b", "a"] }));
        let change =
            apply_consequence(&tag_op(ArrayOperation::Remove, "a"), &DocumentState::default(), &p).unwrap();
        assert_eq!(change.value, json!(["b"]));
        assert!(apply_consequence(&tag_op(ArrayOperation::Remove, "z"), &DocumentState::default(), &p).is_none());
    }

    #[test]
    fn stub_mutation_is_not_resolved_here() {
        let c = MilestoneConsequence::StubMutation {
            filter: json!({ "type": "todo" }),
            mutation: json!({ "resolve": true }),
        };
        assert!(apply_consequence(&c, &DocumentState::default(), &PropertyMap::new()).is_none());
    }
}
