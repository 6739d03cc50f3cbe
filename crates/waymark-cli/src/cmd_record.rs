use crate::property_store::PropertyStore;
use crate::workspace::Workspace;
use serde_json::json;
use std::path::Path;
use waymark_milestone::{MilestoneCallbacks, MilestoneEvaluator};
use waymark_sampler::QaMilestoneCollector;

/// `waymark record <event>`
pub fn execute(repo_root: &Path, event: &str) -> anyhow::Result<()> {
    let event = event.trim();
    if event.is_empty() {
        anyhow::bail!("event name must not be empty");
    }
    let ws = Workspace::open(repo_root)?;
    let _lock = ws.lock()?;

    let mut evaluator = ws.evaluator(MilestoneCallbacks::none())?;
    evaluator.record_event(event);
    ws.save_evaluator(&evaluator)?;
    let count = evaluator.event_count(event);
    println!("{event} #{count}");

    let mut collector = with_providers(ws.collector()?, &ws, &evaluator);
    if let Some(snapshot) = collector.on_event("event", Some(event)) {
        println!("  QA checkpoint captured (occurrence {})", snapshot.occurrence);
    }
    ws.save_sampler(collector.sampler())?;
    Ok(())
}

/// Attach the workspace's metric providers. Each closure owns what it needs
/// and only runs when a checkpoint is captured.
pub fn with_providers(
    collector: QaMilestoneCollector,
    ws: &Workspace,
    evaluator: &MilestoneEvaluator,
) -> QaMilestoneCollector {
    let counters = evaluator.counters().clone();
    let fired = evaluator.history().filter(|e| e.success).count();
    let failed = evaluator.history().filter(|e| !e.success).count();
    let milestones = evaluator.milestones().len();
    let store = PropertyStore::new(&ws.paths.properties_json);

    collector
        .with_metrics(move || {
            json!({
                "total_events": counters.total(),
                "distinct_events": counters.len(),
                "active_milestones": milestones,
            })
        })
        .with_provider_stats(move || {
            json!({
                "milestones_fired": fired,
                "milestones_failed": failed,
            })
        })
        .with_stub_distribution(move || store.stub_distribution())
}
