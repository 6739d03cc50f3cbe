use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use waymark_core::milestone::{MilestoneScope, MilestoneTrigger, UserMilestoneConfig};
use waymark_core::trigger::{valid_gap, valid_window};
use waymark_core::{ComparisonOp, ThresholdProperty};

/// A config document with a top-level `milestones` list.
pub trait MilestoneDocument: DeserializeOwned + Default {
    fn milestones(&self) -> &[UserMilestoneConfig];
}

/// Parse a config document: expand short-form triggers, deserialize, then
/// validate its milestones. An empty document is `T::default()`. Returns the
/// document with the non-fatal validation warnings.
pub fn parse_document<T: MilestoneDocument>(yaml: &str) -> Result<(T, Vec<String>), ConfigError> {
    let mut raw: Value = serde_yaml::from_str(yaml)?;
    if raw.is_null() {
        return Ok((T::default(), Vec::new()));
    }
    normalize_triggers(&mut raw)?;
    let document: T = serde_yaml::from_value(raw)?;
    let warnings = validate_milestones(document.milestones())?;
    Ok((document, warnings))
}

/// Rewrite short-form triggers under `milestones` into tagged mappings.
///
/// Short: `trigger: "refinement >= 0.7"`
/// Long:  `trigger: { type: threshold, property: refinement, operator: ">=", value: 0.7 }`
fn normalize_triggers(raw: &mut Value) -> Result<(), ConfigError> {
    let Some(milestones) = raw.get_mut("milestones").and_then(Value::as_sequence_mut) else {
        return Ok(());
    };
    for milestone in milestones.iter_mut() {
        if let Some(trigger) = milestone.get_mut("trigger") {
            normalize_trigger(trigger)?;
        }
    }
    Ok(())
}

fn normalize_trigger(trigger: &mut Value) -> Result<(), ConfigError> {
    if let Some(short) = trigger.as_str() {
        let expanded = parse_short_trigger(short)?;
        *trigger = expanded;
        return Ok(());
    }

    let Some(map) = trigger.as_mapping_mut() else {
        return Err(ConfigError::InvalidTrigger(format!("{trigger:?}")));
    };
    let is_composite = map.get("type").and_then(Value::as_str) == Some("composite");
    if is_composite {
        if let Some(children) = map.get_mut("triggers").and_then(Value::as_sequence_mut) {
            for child in children.iter_mut() {
                normalize_trigger(child)?;
            }
        }
    }
    Ok(())
}

fn parse_short_trigger(short: &str) -> Result<Value, ConfigError> {
    let invalid = || ConfigError::InvalidShortTrigger {
        value: short.to_string(),
    };
    let parts: Vec<&str> = short.split_whitespace().collect();
    let [property, operator, number] = parts.as_slice() else {
        return Err(invalid());
    };
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let mut out = Mapping::new();
    out.insert("type".into(), "threshold".into());
    out.insert("property".into(), (*property).into());
    out.insert("operator".into(), (*operator).into());
    out.insert("value".into(), value.into());
    Ok(Value::Mapping(out))
}

/// Check structural constraints. Duplicate or empty ids are fatal; anything
/// that merely makes a milestone inert is returned (and logged) as a warning.
pub fn validate_milestones(milestones: &[UserMilestoneConfig]) -> Result<Vec<String>, ConfigError> {
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for (index, m) in milestones.iter().enumerate() {
        if m.id.trim().is_empty() {
            return Err(ConfigError::EmptyId { index });
        }
        if !seen.insert(m.id.as_str()) {
            return Err(ConfigError::DuplicateId(m.id.clone()));
        }

        trigger_warnings(&m.id, &m.trigger, &mut warnings);
        scope_warnings(&m.id, &m.scope, &mut warnings);
        if m.cooldown_hours.is_some() && !m.repeatable {
            warnings.push(format!(
                "{}: cooldown_hours has no effect on a non-repeatable milestone",
                m.id
            ));
        }
    }

    for w in &warnings {
        tracing::warn!("{w}");
    }
    Ok(warnings)
}

fn trigger_warnings(id: &str, trigger: &MilestoneTrigger, out: &mut Vec<String>) {
    match trigger {
        MilestoneTrigger::Threshold {
            property, operator, ..
        } => {
            if ThresholdProperty::parse(property).is_none() {
                out.push(format!("{id}: unknown threshold property \"{property}\""));
            }
            if ComparisonOp::parse(operator).is_none() {
                out.push(format!("{id}: unknown threshold operator \"{operator}\""));
            }
        }
        MilestoneTrigger::EventCount {
            count,
            window_hours,
            ..
        } => {
            if *count == 0 {
                out.push(format!("{id}: event_count with count 0 always matches"));
            }
            if let Some(hours) = window_hours.filter(|h| !valid_window(*h)) {
                out.push(format!("{id}: invalid window_hours {hours} never matches"));
            }
        }
        MilestoneTrigger::EventSequence { sequence } => {
            if sequence.is_empty() {
                out.push(format!("{id}: empty event sequence never matches"));
            }
            for (step, gap) in sequence
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.max_gap_minutes.map(|g| (i, g)))
            {
                if !valid_gap(gap) {
                    out.push(format!(
                        "{id}: invalid max_gap_minutes {gap} at step {step} never matches"
                    ));
                }
            }
        }
        MilestoneTrigger::Composite { triggers, .. } => {
            if triggers.is_empty() {
                out.push(format!("{id}: empty composite trigger never matches"));
            }
            for child in triggers {
                trigger_warnings(id, child, out);
            }
        }
    }
}

fn scope_warnings(id: &str, scope: &MilestoneScope, out: &mut Vec<String>) {
    match scope {
        MilestoneScope::Tag { tags } if tags.is_empty() => {
            out.push(format!("{id}: tag scope without tags never matches"));
        }
        MilestoneScope::Property { operator, .. }
            if !matches!(operator.as_str(), "==" | "!=" | "contains" | "exists") =>
        {
            out.push(format!("{id}: unknown scope operator \"{operator}\""));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use waymark_core::milestone::{CompositeOp, MilestoneConsequence, SnapshotOperation};

    #[derive(Debug, Default, Deserialize)]
    struct Doc {
        #[serde(default)]
        milestones: Vec<UserMilestoneConfig>,
    }

    impl MilestoneDocument for Doc {
        fn milestones(&self) -> &[UserMilestoneConfig] {
            &self.milestones
        }
    }

    fn parse_milestones(yaml: &str) -> Result<Vec<UserMilestoneConfig>, ConfigError> {
        parse_document::<Doc>(yaml).map(|(doc, _)| doc.milestones)
    }

    #[test]
    fn parse_full_file() {
        let yaml = r#"
milestones:
  - id: polished
    name: Polished
    priority: 10
    trigger:
      type: threshold
      property: refinement
      operator: ">="
      value: 0.7
    snapshot_form:
      operation: commit
      message_template: "{{milestone}}: {{document}}"
    consequences:
      - type: array_mutation
        property: tags
        operation: add
        value: polished
    scope:
      mode: folder
      pattern: "projects/**"
  - id: habit
    name: Habit
    repeatable: true
    cooldown_hours: 24
    trigger:
      type: event_count
      event: open
      count: 5
      window_hours: 48
"#;
        let ms = parse_milestones(yaml).unwrap();
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].snapshot_form.operation, SnapshotOperation::Commit);
        assert!(matches!(
            ms[0].consequences[0],
            MilestoneConsequence::ArrayMutation { .. }
        ));
        assert_eq!(ms[1].cooldown_hours, Some(24.0));
    }

    #[test]
    fn short_form_threshold() {
        let yaml = r#"
milestones:
  - id: healthy
    name: Healthy
    trigger: "health > 0.5"
"#;
        let ms = parse_milestones(yaml).unwrap();
        assert_eq!(ms[0].trigger, MilestoneTrigger::threshold("health", ">", 0.5));
    }

    #[test]
    fn short_form_inside_composite() {
        let yaml = r#"
milestones:
  - id: ready
    name: Ready
    trigger:
      type: composite
      operator: and
      triggers:
        - "refinement >= 0.8"
        - type: event_count
          event: review
          count: 1
"#;
        let ms = parse_milestones(yaml).unwrap();
        match &ms[0].trigger {
            MilestoneTrigger::Composite { operator, triggers } => {
                assert_eq!(*operator, CompositeOp::And);
                assert_eq!(triggers[0], MilestoneTrigger::threshold("refinement", ">=", 0.8));
            }
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[test]
    fn malformed_short_form_rejected() {
        let yaml = "milestones: [{ id: x, name: X, trigger: \"refinement high\" }]";
        let err = parse_milestones(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShortTrigger { .. }));

        let yaml = "milestones: [{ id: x, name: X, trigger: \"refinement >= lots\" }]";
        assert!(parse_milestones(yaml).is_err());
    }

    #[test]
    fn non_mapping_trigger_rejected() {
        let yaml = "milestones: [{ id: x, name: X, trigger: 42 }]";
        let err = parse_milestones(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTrigger(_)));
    }

    #[test]
    fn duplicate_id_rejected() {
        let yaml = r#"
milestones:
  - { id: a, name: A, trigger: "refinement >= 0.1" }
  - { id: a, name: B, trigger: "refinement >= 0.2" }
"#;
        let err = parse_milestones(yaml).unwrap_err();
        assert_eq!(err.to_string(), "duplicate milestone id: \"a\"");
    }

    #[test]
    fn empty_id_rejected() {
        let yaml = r#"milestones: [{ id: " ", name: A, trigger: "refinement >= 0.1" }]"#;
        assert!(matches!(
            parse_milestones(yaml).unwrap_err(),
            ConfigError::EmptyId { index: 0 }
        ));
    }

    #[test]
    fn inert_configuration_only_warns() {
        let yaml = r#"
milestones:
  - id: odd
    name: Odd
    cooldown_hours: 3
    trigger: "sharpness >= 0.1"
    scope: { mode: property, property: status, operator: "~=" }
"#;
        let (doc, warnings) = parse_document::<Doc>(yaml).unwrap();
        assert_eq!(doc.milestones.len(), 1);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("sharpness")));
        assert!(warnings.iter().any(|w| w.contains("~=")));
        assert!(warnings.iter().any(|w| w.contains("cooldown_hours")));
    }

    #[test]
    fn empty_document_is_no_milestones() {
        assert!(parse_milestones("").unwrap().is_empty());
        assert!(parse_milestones("milestones: []").unwrap().is_empty());
    }

    #[test]
    fn invalid_window_and_gap_warn() {
        let yaml = r#"
milestones:
  - id: burst
    name: Burst
    trigger: { type: event_count, event: open, count: 1, window_hours: -1e30 }
  - id: flow
    name: Flow
    trigger:
      type: event_sequence
      sequence:
        - event: open
        - event: edit
          max_gap_minutes: -5
"#;
        let (doc, warnings) = parse_document::<Doc>(yaml).unwrap();
        assert_eq!(doc.milestones.len(), 2);
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings[0].starts_with("burst: invalid window_hours"));
        assert!(warnings[1].starts_with("flow: invalid max_gap_minutes -5 at step 1"));
    }
}
