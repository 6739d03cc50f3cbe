//! Trigger evaluation: a pure function from trigger + document state + event
//! ledgers to a verdict with diagnostic details.
//!
//! Misconfiguration (unknown property or operator, empty sequence, empty
//! composite, a negative window or gap) never panics or errors; the trigger
//! simply does not match and `details.error` says why.

use crate::events::{EventCounters, EventHistory};
use crate::milestone::{CompositeOp, MilestoneTrigger, SequenceStep};
use crate::types::{ComparisonOp, DocumentState, ThresholdProperty, Timestamp, HOUR_MS, MINUTE_MS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Verdict of one trigger evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub matched: bool,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl TriggerResult {
    fn new(matched: bool, details: Value) -> Self {
        Self {
            matched,
            details: into_map(details),
        }
    }

    /// Unmatched, with `details.error` set.
    fn error(message: String, mut details: Value) -> Self {
        if let Value::Object(map) = &mut details {
            map.insert("error".into(), Value::String(message));
            return Self::new(false, details);
        }
        Self::new(false, json!({ "error": message }))
    }

    pub fn error_message(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

/// Everything a trigger may read.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub state: &'a DocumentState,
    pub counters: &'a EventCounters,
    pub history: &'a EventHistory,
    pub now: Timestamp,
}

/// Evaluate a trigger against the given context.
pub fn evaluate_trigger(trigger: &MilestoneTrigger, ctx: &TriggerContext<'_>) -> TriggerResult {
    match trigger {
        MilestoneTrigger::Threshold {
            property,
            operator,
            value,
        } => eval_threshold(property, operator, *value, ctx.state),
        MilestoneTrigger::EventCount {
            event,
            count,
            window_hours,
        } => eval_event_count(event, *count, *window_hours, ctx),
        MilestoneTrigger::EventSequence { sequence } => eval_event_sequence(sequence, ctx.history),
        MilestoneTrigger::Composite { operator, triggers } => {
            eval_composite(*operator, triggers, ctx)
        }
    }
}

fn eval_threshold(
    property: &str,
    operator: &str,
    threshold: f64,
    state: &DocumentState,
) -> TriggerResult {
    let base = json!({
        "property": property,
        "operator": operator,
        "threshold": threshold,
    });
    let Some(prop) = ThresholdProperty::parse(property) else {
        return TriggerResult::error(format!("unknown property: {property}"), base);
    };
    let Some(op) = ComparisonOp::parse(operator) else {
        return TriggerResult::error(format!("unknown operator: {operator}"), base);
    };
    let Some(actual) = state.metric(prop) else {
        return TriggerResult::error(format!("property not available: {property}"), base);
    };

    let mut details = base;
    details["actual"] = json!(actual);
    TriggerResult::new(op.compare(actual, threshold), details)
}

fn eval_event_count(
    event: &str,
    required: u64,
    window_hours: Option<f64>,
    ctx: &TriggerContext<'_>,
) -> TriggerResult {
    if let Some(hours) = window_hours {
        if !valid_window(hours) {
            return TriggerResult::error(
                format!("invalid window_hours: {hours}"),
                json!({ "event": event, "required": required }),
            );
        }
    }

    let actual = match window_hours {
        Some(hours) => {
            let cutoff = ctx.now.saturating_sub((hours * HOUR_MS as f64) as i64);
            ctx.history
                .iter()
                .filter(|r| r.event == event && r.timestamp >= cutoff)
                .count() as u64
        }
        None => ctx.counters.get(event),
    };

    let mut details = json!({
        "event": event,
        "count": actual,
        "required": required,
    });
    if let Some(hours) = window_hours {
        details["window_hours"] = json!(hours);
    }
    TriggerResult::new(actual >= required, details)
}

/// Single left-to-right scan. A step whose gap from the previous match is too
/// large resets progress to zero; the violating event is not retried as a
/// fresh start.
fn eval_event_sequence(sequence: &[SequenceStep], history: &EventHistory) -> TriggerResult {
    if sequence.is_empty() {
        return TriggerResult::error("empty event sequence".into(), json!({ "progress": 0 }));
    }
    if let Some((index, gap)) = sequence
        .iter()
        .enumerate()
        .find_map(|(i, s)| s.max_gap_minutes.filter(|g| !valid_gap(*g)).map(|g| (i, g)))
    {
        return TriggerResult::error(
            format!("invalid max_gap_minutes at step {index}: {gap}"),
            json!({ "progress": 0, "length": sequence.len() }),
        );
    }

    let mut progress = 0usize;
    let mut anchor: Option<Timestamp> = None;

    for record in history.iter() {
        let step = &sequence[progress];
        if record.event != step.event {
            continue;
        }
        if let (Some(prev), Some(gap_minutes)) = (anchor, step.max_gap_minutes) {
            let max_gap = (gap_minutes * MINUTE_MS as f64) as i64;
            if record.timestamp.saturating_sub(prev) > max_gap {
                progress = 0;
                anchor = None;
                continue;
            }
        }
        progress += 1;
        anchor = Some(record.timestamp);
        if progress == sequence.len() {
            return TriggerResult::new(
                true,
                json!({
                    "progress": progress,
                    "length": sequence.len(),
                    "matched_at": record.timestamp,
                }),
            );
        }
    }

    TriggerResult::new(
        false,
        json!({
            "progress": progress,
            "length": sequence.len(),
        }),
    )
}

/// A gap must be a finite, non-negative number of minutes.
pub fn valid_gap(minutes: f64) -> bool {
    minutes >= 0.0 && minutes.is_finite()
}

/// A window must be a finite, positive number of hours.
pub fn valid_window(hours: f64) -> bool {
    hours > 0.0 && hours.is_finite()
}

fn eval_composite(
    operator: CompositeOp,
    triggers: &[MilestoneTrigger],
    ctx: &TriggerContext<'_>,
) -> TriggerResult {
    let op_name = match operator {
        CompositeOp::And => "and",
        CompositeOp::Or => "or",
    };
    if triggers.is_empty() {
        return TriggerResult::error(
            "composite trigger has no children".into(),
            json!({ "operator": op_name, "results": [] }),
        );
    }

    // Every child is evaluated so the details carry the full picture.
    let results: Vec<TriggerResult> = triggers.iter().map(|t| evaluate_trigger(t, ctx)).collect();
    let matched = match operator {
        CompositeOp::And => results.iter().all(|r| r.matched),
        CompositeOp::Or => results.iter().any(|r| r.matched),
    };

    let children: Vec<Value> = triggers
        .iter()
        .zip(&results)
        .map(|(t, r)| {
            json!({
                "type": t.type_name(),
                "matched": r.matched,
                "details": r.details,
            })
        })
        .collect();

    TriggerResult::new(
        matched,
        json!({
            "operator": op_name,
            "results": children,
        }),
    )
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
