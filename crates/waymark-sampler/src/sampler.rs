use crate::checkpoint::is_checkpoint;
use crate::persist::SamplerExport;
use crate::snapshot::{sample_key, QaMilestoneSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Default ring size per event type.
pub const DEFAULT_MAX_SNAPSHOTS_PER_TYPE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_max_snapshots_per_type")]
    pub max_snapshots_per_type: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_snapshots_per_type: DEFAULT_MAX_SNAPSHOTS_PER_TYPE,
        }
    }
}

fn default_max_snapshots_per_type() -> usize {
    DEFAULT_MAX_SNAPSHOTS_PER_TYPE
}

/// Sizes of the sampler's three stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerStats {
    pub tracked_keys: usize,
    pub captured_checkpoints: usize,
    pub stored_snapshots: usize,
}

/// Per-key occurrence counters, the set of checkpoints already captured, and
/// a bounded ring of snapshots per event type.
#[derive(Debug, Clone, Default)]
pub struct PowerLawSampler {
    counters: BTreeMap<String, u64>,
    captured: BTreeSet<String>,
    snapshots: BTreeMap<String, VecDeque<QaMilestoneSnapshot>>,
    config: SamplerConfig,
}

impl PowerLawSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SamplerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> SamplerConfig {
        self.config
    }

    /// Whether `value` is a checkpoint for `key` that has not been captured
    /// yet. A `true` answer marks it captured.
    pub fn should_capture(&mut self, key: &str, value: u64) -> bool {
        if !is_checkpoint(value) {
            return false;
        }
        self.captured.insert(format!("{key}:{value}"))
    }

    /// Bump the counter for `key` and return the new count.
    pub fn increment(&mut self, key: &str) -> u64 {
        let count = self.counters.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Bump the counter for `event_type` (or `event_type:sub_key`) and decide
    /// whether this occurrence is captured.
    pub fn increment_and_check(&mut self, event_type: &str, sub_key: Option<&str>) -> (u64, bool) {
        let key = sample_key(event_type, sub_key);
        let count = self.increment(&key);
        let capture = self.should_capture(&key, count);
        if capture {
            tracing::debug!(key = %key, count, "checkpoint reached");
        }
        (count, capture)
    }

    /// Append to the event type's ring, evicting the oldest past capacity.
    pub fn record_snapshot(&mut self, snapshot: QaMilestoneSnapshot) {
        let max = self.config.max_snapshots_per_type.max(1);
        let ring = self.snapshots.entry(snapshot.event_type.clone()).or_default();
        ring.push_back(snapshot);
        while ring.len() > max {
            ring.pop_front();
        }
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }

    pub fn is_captured(&self, key: &str, value: u64) -> bool {
        self.captured.contains(&format!("{key}:{value}"))
    }

    /// Stored snapshots for one event type, oldest first.
    pub fn snapshots(&self, event_type: &str) -> impl DoubleEndedIterator<Item = &QaMilestoneSnapshot> {
        self.snapshots.get(event_type).into_iter().flatten()
    }

    /// Every stored snapshot, ordered by timestamp.
    pub fn all_snapshots(&self) -> Vec<&QaMilestoneSnapshot> {
        let mut all: Vec<&QaMilestoneSnapshot> = self.snapshots.values().flatten().collect();
        all.sort_by_key(|s| s.timestamp);
        all
    }

    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            tracked_keys: self.counters.len(),
            captured_checkpoints: self.captured.len(),
            stored_snapshots: self.snapshots.values().map(VecDeque::len).sum(),
        }
    }

    pub fn clear(&mut self) {
        self.counters.clear();
        self.captured.clear();
        self.snapshots.clear();
    }

    // ── Persistence ──

    pub fn export(&self) -> SamplerExport {
        SamplerExport {
            counters: self.counters.clone(),
            captured_checkpoints: self.captured.iter().cloned().collect(),
            snapshots: self
                .snapshots
                .iter()
                .map(|(k, ring)| (k.clone(), ring.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Replace all state with `data`. Rings are trimmed to the current capacity.
    pub fn import(&mut self, data: SamplerExport) {
        self.counters = data.counters;
        self.captured = data.captured_checkpoints.into_iter().collect();
        self.snapshots.clear();
        for snapshot in data.snapshots.into_values().flatten() {
            self.record_snapshot(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(event: &str, occurrence: u64) -> QaMilestoneSnapshot {
        QaMilestoneSnapshot::new(event, occurrence, "s1", occurrence as i64)
    }

    #[test]
    fn checkpoint_captured_once() {
        let mut sampler = PowerLawSampler::new();
        assert!(sampler.should_capture("open", 4));
        assert!(!sampler.should_capture("open", 4));
        assert!(sampler.should_capture("close", 4));
        assert!(!sampler.should_capture("open", 5));
        assert!(sampler.is_captured("open", 4));
    }

    #[test]
    fn increment_and_check_follows_power_law() {
        let mut sampler = PowerLawSampler::new();
        let captured: Vec<u64> = (0..1100)
            .filter_map(|_| {
                let (count, capture) = sampler.increment_and_check("edit", None);
                capture.then_some(count)
            })
            .collect();
        assert_eq!(captured, [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1000]);
        assert_eq!(sampler.counter("edit"), 1100);
    }

    #[test]
    fn sub_keys_count_separately() {
        let mut sampler = PowerLawSampler::new();
        assert_eq!(sampler.increment_and_check("provider", Some("a")), (1, true));
        assert_eq!(sampler.increment_and_check("provider", Some("a")), (2, true));
        assert_eq!(sampler.increment_and_check("provider", Some("b")), (1, true));
        assert_eq!(sampler.counter("provider:a"), 2);
        assert_eq!(sampler.counter("provider"), 0);
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut sampler = PowerLawSampler::with_config(SamplerConfig {
            max_snapshots_per_type: 3,
        });
        for i in 1..=5 {
            sampler.record_snapshot(snap("open", i));
        }
        sampler.record_snapshot(snap("close", 1));
        let kept: Vec<u64> = sampler.snapshots("open").map(|s| s.occurrence).collect();
        assert_eq!(kept, [3, 4, 5]);
        assert_eq!(sampler.stats().stored_snapshots, 4);
        assert_eq!(sampler.snapshots("missing").count(), 0);
    }

    #[test]
    fn all_snapshots_by_time() {
        let mut sampler = PowerLawSampler::new();
        sampler.record_snapshot(snap("b", 2));
        sampler.record_snapshot(snap("a", 3));
        sampler.record_snapshot(snap("b", 1));
        let order: Vec<i64> = sampler.all_snapshots().iter().map(|s| s.timestamp).collect();
        assert_eq!(order, [1, 2, 3]);
    }

    #[test]
    fn import_prevents_recapture() {
        let mut sampler = PowerLawSampler::new();
        sampler.increment_and_check("open", None);
        sampler.increment_and_check("open", None);
        sampler.record_snapshot(snap("open", 2));

        let mut fresh = PowerLawSampler::new();
        fresh.import(sampler.export());
        assert_eq!(fresh.counter("open"), 2);
        assert!(!fresh.should_capture("open", 2));
        assert_eq!(fresh.increment_and_check("open", None), (3, false));
        assert_eq!(fresh.increment_and_check("open", None), (4, true));
        assert_eq!(fresh.snapshots("open").count(), 1);
    }

    #[test]
    fn imported_counter_saturates() {
        let mut sampler = PowerLawSampler::new();
        sampler.import(SamplerExport {
            counters: [("open".to_string(), u64::MAX)].into_iter().collect(),
            ..Default::default()
        });
        assert_eq!(sampler.increment_and_check("open", None), (u64::MAX, false));
        assert_eq!(sampler.counter("open"), u64::MAX);
    }

    #[test]
    fn clear_resets_everything() {
        let mut sampler = PowerLawSampler::new();
        sampler.increment_and_check("open", None);
        sampler.record_snapshot(snap("open", 1));
        sampler.clear();
        assert_eq!(sampler.stats(), SamplerStats::default());
        assert_eq!(sampler.increment_and_check("open", None), (1, true));
    }
}
