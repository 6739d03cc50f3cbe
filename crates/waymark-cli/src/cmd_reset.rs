use crate::workspace::Workspace;
use std::path::Path;
use waymark_milestone::persist::{save_export, EvaluatorExport};
use waymark_sampler::SamplerExport;

/// `waymark reset`: clears counters, event history, triggered history and QA
/// snapshots. Milestone config and document properties are kept.
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(repo_root)?;
    let _lock = ws.lock()?;
    save_export(&ws.paths.evaluator_json, &EvaluatorExport::default())?;
    waymark_sampler::persist::save_export(&ws.paths.sampler_json, &SamplerExport::default())?;
    println!("Cleared evaluator and sampler state");
    Ok(())
}
