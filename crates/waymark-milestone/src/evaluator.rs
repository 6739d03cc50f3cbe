use crate::actions::{GitSnapshotResult, MilestoneCallbacks, SnapshotRequest};
use crate::outcome::{ConsequenceResult, MilestoneHistoryEntry, MilestoneTriggeredEvent};
use crate::persist::EvaluatorExport;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use waymark_core::clock::{Clock, SystemClock};
use waymark_core::consequence::{apply_consequence, PropertyChange};
use waymark_core::events::{EventCounters, EventHistory, DEFAULT_MAX_EVENT_HISTORY};
use waymark_core::milestone::{MilestoneConsequence, SnapshotOperation, UserMilestoneConfig};
use waymark_core::scope::milestone_applies;
use waymark_core::template::milestone_variables;
use waymark_core::trigger::{evaluate_trigger, TriggerContext, TriggerResult};
use waymark_core::{DocumentState, PropertyMap, Timestamp};

/// Default cap on retained milestone history entries.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Retention limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_max_event_history")]
    pub max_event_history: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_event_history: DEFAULT_MAX_EVENT_HISTORY,
        }
    }
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}
fn default_max_event_history() -> usize {
    DEFAULT_MAX_EVENT_HISTORY
}

/// Owns the active milestones, the event ledgers, per-milestone
/// `last_triggered` times and the triggered-history log.
///
/// Single writer: `evaluate` takes `&mut self`, so concurrent evaluation on
/// one instance is ruled out by the borrow checker. Callbacks are awaited one
/// at a time, in priority order.
pub struct MilestoneEvaluator {
    milestones: Vec<UserMilestoneConfig>,
    counters: EventCounters,
    events: EventHistory,
    last_triggered: BTreeMap<String, Timestamp>,
    history: VecDeque<MilestoneHistoryEntry>,
    config: EvaluatorConfig,
    callbacks: MilestoneCallbacks,
    clock: Arc<dyn Clock>,
}

impl MilestoneEvaluator {
    pub fn new(milestones: Vec<UserMilestoneConfig>, callbacks: MilestoneCallbacks) -> Self {
        let config = EvaluatorConfig::default();
        let mut evaluator = Self {
            milestones: Vec::new(),
            counters: EventCounters::new(),
            events: EventHistory::new(config.max_event_history),
            last_triggered: BTreeMap::new(),
            history: VecDeque::new(),
            config,
            callbacks,
            clock: Arc::new(SystemClock),
        };
        evaluator.set_milestones(milestones);
        evaluator
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self.events.set_max_size(config.max_event_history);
        self.prune_history();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the milestone set. Disabled milestones are dropped; the rest
    /// are ordered by ascending priority (stable for equal priorities).
    pub fn set_milestones(&mut self, milestones: Vec<UserMilestoneConfig>) {
        let mut active: Vec<UserMilestoneConfig> =
            milestones.into_iter().filter(|m| m.enabled).collect();
        active.sort_by_key(|m| m.priority);
        self.milestones = active;
    }

    /// Active milestones in evaluation order.
    pub fn milestones(&self) -> &[UserMilestoneConfig] {
        &self.milestones
    }

    pub fn config(&self) -> EvaluatorConfig {
        self.config
    }

    // ── Event ledgers ──

    /// Count one occurrence of `event` and append it to the history.
    pub fn record_event(&mut self, event: &str) {
        let now = self.clock.now_ms();
        let count = self.counters.increment(event);
        self.events.push(event, now);
        tracing::debug!(event, count, "recorded event");
    }

    pub fn event_count(&self, event: &str) -> u64 {
        self.counters.get(event)
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    pub fn event_history(&self) -> &EventHistory {
        &self.events
    }

    // ── Triggered history ──

    /// Triggered-history log, oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &MilestoneHistoryEntry> {
        self.history.iter()
    }

    pub fn history_for_document<'a>(
        &'a self,
        document_path: &'a str,
    ) -> impl Iterator<Item = &'a MilestoneHistoryEntry> + 'a {
        self.history
            .iter()
            .filter(move |e| e.document_path == document_path)
    }

    pub fn last_triggered(&self, milestone_id: &str) -> Option<Timestamp> {
        self.last_triggered.get(milestone_id).copied()
    }

    /// Whether a successful firing of `milestone_id` for `document_path` is on record.
    pub fn has_fired(&self, milestone_id: &str, document_path: &str) -> bool {
        self.history.iter().any(|e| {
            e.success && e.milestone_id == milestone_id && e.document_path == document_path
        })
    }

    /// Whether a repeatable milestone is still cooling down at `now`.
    pub fn is_in_cooldown(&self, milestone: &UserMilestoneConfig, now: Timestamp) -> bool {
        let Some(cooldown) = milestone.cooldown_ms() else {
            return false;
        };
        match self.last_triggered.get(&milestone.id) {
            Some(last) => now.saturating_sub(*last) < cooldown,
            None => false,
        }
    }

    /// Reset counters, event history, last-triggered times and the history log.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.events.clear();
        self.last_triggered.clear();
        self.history.clear();
    }

    // ── Evaluation ──

    /// Run one evaluation pass for a document and return the milestones that fired.
    ///
    /// Never fails: scope misses, cooldowns, prior firings and unmatched
    /// triggers are skips; callback failures land in the returned events and
    /// in the history log.
    pub async fn evaluate(
        &mut self,
        document_path: &str,
        state: &DocumentState,
        tags: Option<&[String]>,
        properties: Option<&PropertyMap>,
    ) -> Vec<MilestoneTriggeredEvent> {
        let now = self.clock.now_ms();
        let base_properties = consequence_properties(tags, properties);
        let milestones = self.milestones.clone();
        let mut fired = Vec::new();

        for milestone in &milestones {
            if !milestone_applies(milestone, document_path, tags, properties) {
                tracing::debug!(milestone = %milestone.id, document = document_path, "out of scope");
                continue;
            }
            if self.is_in_cooldown(milestone, now) {
                tracing::debug!(milestone = %milestone.id, "in cooldown");
                continue;
            }
            if !milestone.repeatable && self.has_fired(&milestone.id, document_path) {
                tracing::debug!(milestone = %milestone.id, document = document_path, "already fired");
                continue;
            }

            let trigger_result = {
                let ctx = TriggerContext {
                    state,
                    counters: &self.counters,
                    history: &self.events,
                    now,
                };
                evaluate_trigger(&milestone.trigger, &ctx)
            };
            if !trigger_result.matched {
                if let Some(err) = trigger_result.error_message() {
                    tracing::debug!(milestone = %milestone.id, error = err, "trigger not evaluable");
                }
                continue;
            }

            let event = self
                .fire(milestone, document_path, state, &base_properties, trigger_result, now)
                .await;
            fired.push(event);
        }

        fired
    }

    async fn fire(
        &mut self,
        milestone: &UserMilestoneConfig,
        document_path: &str,
        state: &DocumentState,
        base_properties: &PropertyMap,
        trigger_result: TriggerResult,
        now: Timestamp,
    ) -> MilestoneTriggeredEvent {
        let variables = milestone_variables(document_path, state.refinement, &milestone.name, now);
        let mut errors: Vec<String> = Vec::new();

        let git_result = match milestone.snapshot_form.operation {
            SnapshotOperation::None => None,
            _ => {
                let result = match &self.callbacks.git_snapshot {
                    Some(executor) => {
                        let request =
                            SnapshotRequest::render(&milestone.snapshot_form, document_path, &variables);
                        executor.execute_snapshot(&request).await
                    }
                    None => GitSnapshotResult::failed("no git snapshot executor configured"),
                };
                if !result.success {
                    errors.push(format!(
                        "snapshot: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                Some(result)
            }
        };

        // Consequences chain on a working copy so that e.g. two bumps accumulate.
        let mut working_state = state.clone();
        let mut working_properties = base_properties.clone();
        let mut consequence_results = Vec::with_capacity(milestone.consequences.len());

        for consequence in &milestone.consequences {
            let result = self
                .dispatch_consequence(
                    consequence,
                    document_path,
                    &mut working_state,
                    &mut working_properties,
                )
                .await;
            if let Some(err) = &result.error {
                errors.push(format!("{}: {err}", result.consequence_type));
            }
            consequence_results.push(result);
        }

        self.last_triggered.insert(milestone.id.clone(), now);

        let success = errors.is_empty();
        let error = (!success).then(|| errors.join("; "));
        if success {
            tracing::info!(milestone = %milestone.id, document = document_path, "milestone fired");
        } else {
            tracing::warn!(
                milestone = %milestone.id,
                document = document_path,
                error = error.as_deref().unwrap_or_default(),
                "milestone fired with failures"
            );
        }

        let event = MilestoneTriggeredEvent {
            milestone_id: milestone.id.clone(),
            milestone_name: milestone.name.clone(),
            document_path: document_path.to_string(),
            timestamp: now,
            trigger_result,
            git_result,
            consequence_results,
            success,
            error,
        };
        self.push_history(MilestoneHistoryEntry::from(&event));
        event
    }

    async fn dispatch_consequence(
        &self,
        consequence: &MilestoneConsequence,
        document_path: &str,
        working_state: &mut DocumentState,
        working_properties: &mut PropertyMap,
    ) -> ConsequenceResult {
        let type_name = consequence.type_name();

        if let MilestoneConsequence::StubMutation { filter, mutation } = consequence {
            return match &self.callbacks.stub_mutation {
                Some(applier) => {
                    let r = applier.apply_stub_mutation(document_path, filter, mutation).await;
                    ConsequenceResult {
                        consequence_type: type_name.to_string(),
                        applied: r.success,
                        property: None,
                        value: Some(json!({ "filter": filter, "mutation": mutation })),
                        error: failure_message(r.success, r.error),
                    }
                }
                None => ConsequenceResult::failed(type_name, "no stub mutation handler configured"),
            };
        }

        let Some(change) = apply_consequence(consequence, working_state, working_properties) else {
            return ConsequenceResult::unchanged(type_name);
        };

        let Some(applier) = &self.callbacks.property_change else {
            return ConsequenceResult {
                property: Some(change.property),
                value: Some(change.value),
                ..ConsequenceResult::failed(type_name, "no property change handler configured")
            };
        };

        let r = applier
            .apply_property_change(document_path, &change.property, &change.value)
            .await;
        if r.success {
            update_working(working_state, working_properties, &change);
        }
        ConsequenceResult {
            consequence_type: type_name.to_string(),
            applied: r.success,
            property: Some(change.property),
            value: Some(change.value),
            error: failure_message(r.success, r.error),
        }
    }

    fn push_history(&mut self, entry: MilestoneHistoryEntry) {
        self.history.push_back(entry);
        self.prune_history();
    }

    fn prune_history(&mut self) {
        let max = self.config.max_history.max(1);
        while self.history.len() > max {
            self.history.pop_front();
        }
    }

    // ── Persistence ──

    /// Plain-data snapshot of all mutable state.
    pub fn export(&self) -> EvaluatorExport {
        EvaluatorExport {
            event_counters: self.counters.clone(),
            event_history: self.events.to_vec(),
            history: self.history.iter().cloned().collect(),
            last_triggered: self.last_triggered.clone(),
        }
    }

    /// Replace all mutable state with `data`. Retention limits are re-applied.
    pub fn import(&mut self, data: EvaluatorExport) {
        self.counters = data.event_counters;
        self.events = EventHistory::from_records(data.event_history, self.config.max_event_history);
        self.history = data.history.into();
        self.last_triggered = data.last_triggered;
        self.prune_history();
    }
}

/// Properties visible to consequences. Caller-supplied tags fill in `tags`
/// when the property map does not carry it.
fn consequence_properties(tags: Option<&[String]>, properties: Option<&PropertyMap>) -> PropertyMap {
    let mut map = properties.cloned().unwrap_or_default();
    if let Some(tags) = tags {
        if !map.contains_key("tags") {
            map.insert("tags".into(), json!(tags));
        }
    }
    map
}

fn update_working(state: &mut DocumentState, properties: &mut PropertyMap, change: &PropertyChange) {
    if change.property == "refinement" {
        if let Some(v) = change.value.as_f64() {
            state.refinement = v;
        }
    }
    properties.insert(change.property.clone(), change.value.clone());
}

fn failure_message(success: bool, error: Option<String>) -> Option<String> {
    if success {
        None
    } else {
        Some(error.unwrap_or_else(|| "unknown error".into()))
    }
}
