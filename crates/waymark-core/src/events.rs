//! Event ledgers: cumulative counters and a bounded, time-ordered history.
//!
//! The two are independent. Pruning the history never touches the counters,
//! so an all-time `event_count` trigger stays correct after old history
//! entries have been discarded.

use crate::types::{EventRecord, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default cap on retained event history entries.
pub const DEFAULT_MAX_EVENT_HISTORY: usize = 1000;

/// Event name → number of times recorded. Counts never decrease except via `clear`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCounters(BTreeMap<String, u64>);

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count.
    pub fn increment(&mut self, event: &str) -> u64 {
        let count = self.0.entry(event.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn get(&self, event: &str) -> u64 {
        self.0.get(event).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<BTreeMap<String, u64>> for EventCounters {
    fn from(map: BTreeMap<String, u64>) -> Self {
        Self(map)
    }
}

/// Append-only event history capped at `max_size` entries; oldest dropped first.
#[derive(Debug, Clone)]
pub struct EventHistory {
    entries: VecDeque<EventRecord>,
    max_size: usize,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_HISTORY)
    }
}

impl EventHistory {
    /// A `max_size` of zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    /// Rebuild from plain records, keeping the newest `max_size`.
    pub fn from_records(records: Vec<EventRecord>, max_size: usize) -> Self {
        let mut history = Self::new(max_size);
        history.entries = records.into();
        history.prune();
        history
    }

    pub fn push(&mut self, event: &str, timestamp: Timestamp) {
        self.entries.push_back(EventRecord {
            event: event.to_string(),
            timestamp,
        });
        self.prune();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &EventRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.prune();
    }

    pub fn to_vec(&self) -> Vec<EventRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn prune(&mut self) {
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_total() {
        let mut c = EventCounters::new();
        assert_eq!(c.increment("open"), 1);
        assert_eq!(c.increment("open"), 2);
        c.increment("edit");
        assert_eq!(c.get("open"), 2);
        assert_eq!(c.get("missing"), 0);
        assert_eq!(c.total(), 3);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn history_drops_oldest_first() {
        let mut h = EventHistory::new(3);
        for (i, e) in ["a", "b", "c", "d"].iter().enumerate() {
            h.push(e, i as i64);
        }
        let events: Vec<&str> = h.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(events, vec!["b", "c", "d"]);
    }

    #[test]
    fn pruning_leaves_counters_untouched() {
        let mut c = EventCounters::new();
        let mut h = EventHistory::new(2);
        for i in 0..5 {
            c.increment("edit");
            h.push("edit", i);
        }
        assert_eq!(h.len(), 2);
        assert_eq!(c.get("edit"), 5);
    }

    #[test]
    fn from_records_keeps_newest() {
        let records = (0..5)
            .map(|i| EventRecord {
                event: format!("e{i}"),
                timestamp: i,
            })
            .collect();
        let h = EventHistory::from_records(records, 2);
        let events: Vec<&str> = h.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(events, vec!["e3", "e4"]);
    }

    #[test]
    fn shrinking_max_size_prunes() {
        let mut h = EventHistory::new(10);
        for i in 0..6 {
            h.push("x", i);
        }
        h.set_max_size(0);
        assert_eq!(h.max_size(), 1);
        assert_eq!(h.len(), 1);
        assert_eq!(h.iter().next().unwrap().timestamp, 5);
    }

    #[test]
    fn counters_serialize_as_plain_map() {
        let mut c = EventCounters::new();
        c.increment("open");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"open":1}"#);
        let back: EventCounters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
