use crate::property_store::normalize_document;
use crate::workspace::Workspace;
use std::path::Path;
use waymark_core::clock::rfc3339;
use waymark_milestone::{MilestoneCallbacks, MilestoneHistoryEntry};

pub struct HistoryParams<'a> {
    pub repo_root: &'a Path,
    pub doc: Option<&'a str>,
    pub milestone: Option<&'a str>,
    pub limit: Option<usize>,
    pub json: bool,
}

/// `waymark history`
pub fn execute(params: &HistoryParams<'_>) -> anyhow::Result<()> {
    let ws = Workspace::open(params.repo_root)?;
    let evaluator = ws.evaluator(MilestoneCallbacks::none())?;
    let entries = select(evaluator.history(), params);

    if params.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No milestones triggered yet");
        return Ok(());
    }
    for e in &entries {
        let status = if e.success { "ok    " } else { "FAILED" };
        println!(
            "{}  {status}  {:<24} {}",
            rfc3339(e.timestamp),
            e.milestone_id,
            e.document_path
        );
        if let Some(sha) = e.git_result.as_ref().and_then(|g| g.commit_sha.as_deref()) {
            println!("    commit {}", &sha[..sha.len().min(10)]);
        }
        if let Some(err) = &e.error {
            println!("    {err}");
        }
    }
    Ok(())
}

/// Apply the filters and keep the newest `limit` entries, oldest first.
fn select<'e>(
    history: impl DoubleEndedIterator<Item = &'e MilestoneHistoryEntry>,
    params: &HistoryParams<'_>,
) -> Vec<MilestoneHistoryEntry> {
    let doc = params.doc.map(normalize_document);
    let mut entries: Vec<MilestoneHistoryEntry> = history
        .rev()
        .filter(|e| doc.as_deref().map_or(true, |d| e.document_path == d))
        .filter(|e| params.milestone.map_or(true, |m| e.milestone_id == m))
        .take(params.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    entries.reverse();
    entries
}
