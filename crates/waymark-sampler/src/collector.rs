use crate::sampler::PowerLawSampler;
use crate::snapshot::QaMilestoneSnapshot;
use serde_json::Value;
use std::sync::Arc;
use waymark_core::clock::{Clock, SystemClock};

/// Zero-argument payload source, called only when a snapshot is taken.
pub type Provider = Box<dyn Fn() -> Value + Send + Sync>;

/// Feeds an event stream into a [`PowerLawSampler`] and builds a snapshot at
/// each captured checkpoint.
pub struct QaMilestoneCollector {
    sampler: PowerLawSampler,
    session_id: String,
    metrics: Option<Provider>,
    provider_stats: Option<Provider>,
    stub_distribution: Option<Provider>,
    clock: Arc<dyn Clock>,
}

impl QaMilestoneCollector {
    pub fn new(sampler: PowerLawSampler, session_id: impl Into<String>) -> Self {
        Self {
            sampler,
            session_id: session_id.into(),
            metrics: None,
            provider_stats: None,
            stub_distribution: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_metrics(mut self, provider: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.metrics = Some(Box::new(provider));
        self
    }

    pub fn with_provider_stats(
        mut self,
        provider: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.provider_stats = Some(Box::new(provider));
        self
    }

    pub fn with_stub_distribution(
        mut self,
        provider: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.stub_distribution = Some(Box::new(provider));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sampler(&self) -> &PowerLawSampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut PowerLawSampler {
        &mut self.sampler
    }

    /// Count one occurrence. Returns the snapshot if this occurrence was a
    /// fresh checkpoint; providers are not called otherwise.
    pub fn on_event(&mut self, event_type: &str, sub_key: Option<&str>) -> Option<QaMilestoneSnapshot> {
        let (count, capture) = self.sampler.increment_and_check(event_type, sub_key);
        if !capture {
            return None;
        }
        Some(self.capture(event_type, sub_key, count))
    }

    /// Count one occurrence and snapshot it regardless of the checkpoint
    /// schedule. Used for session boundaries.
    pub fn force_capture(&mut self, event_type: &str, sub_key: Option<&str>) -> QaMilestoneSnapshot {
        let key = crate::snapshot::sample_key(event_type, sub_key);
        let count = self.sampler.increment(&key);
        // Keep the schedule consistent: a forced capture on a checkpoint
        // consumes it.
        self.sampler.should_capture(&key, count);
        self.capture(event_type, sub_key, count)
    }

    fn capture(&mut self, event_type: &str, sub_key: Option<&str>, occurrence: u64) -> QaMilestoneSnapshot {
        let mut snapshot =
            QaMilestoneSnapshot::new(event_type, occurrence, &self.session_id, self.clock.now_ms());
        snapshot.sub_key = sub_key.map(str::to_string);
        if let Some(metrics) = &self.metrics {
            snapshot.metrics = metrics();
        }
        snapshot.provider_stats = self.provider_stats.as_ref().map(|p| p());
        snapshot.stub_distribution = self.stub_distribution.as_ref().map(|p| p());

        tracing::debug!(event_type, occurrence, session = %self.session_id, "captured QA snapshot");
        self.sampler.record_snapshot(snapshot.clone());
        snapshot
    }
}
