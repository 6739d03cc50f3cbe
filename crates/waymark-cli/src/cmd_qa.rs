use crate::cmd_record::with_providers;
use crate::workspace::Workspace;
use clap::Subcommand;
use std::path::Path;
use waymark_core::clock::rfc3339;
use waymark_milestone::MilestoneCallbacks;
use waymark_sampler::checkpoint::next_checkpoint;
use waymark_sampler::QaMilestoneSnapshot;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum QaCmd {
    /// Show sampler counters and captured snapshots
    Show {
        /// Only snapshots of this event type
        #[arg(long)]
        event: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture a snapshot now, bypassing the checkpoint schedule
    Capture {
        /// Event type (e.g. session_start, session_end)
        event: String,
        /// Optional sub-key counted separately
        #[arg(long)]
        sub_key: Option<String>,
    },
}

// ── Dispatch ──

pub fn run(cmd: QaCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        QaCmd::Show { event, json } => show(repo_root, event.as_deref(), json),
        QaCmd::Capture { event, sub_key } => capture(repo_root, &event, sub_key.as_deref()),
    }
}

// ── Command Implementations ──

/// `waymark qa show`
pub fn show(repo_root: &Path, event: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(repo_root)?;
    let sampler = ws.sampler()?;
    let snapshots: Vec<&QaMilestoneSnapshot> = match event {
        Some(event) => sampler.snapshots(event).collect(),
        None => sampler.all_snapshots(),
    };

    if json {
        let out = serde_json::json!({
            "stats": sampler.stats(),
            "counters": sampler.counters(),
            "snapshots": snapshots,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let stats = sampler.stats();
    println!(
        "{} key(s), {} checkpoint(s) captured, {} snapshot(s) stored",
        stats.tracked_keys, stats.captured_checkpoints, stats.stored_snapshots
    );
    for (key, count) in sampler.counters() {
        println!("  {key:<32} {count:>8}  next checkpoint at {}", next_checkpoint(*count));
    }
    if !snapshots.is_empty() {
        println!();
    }
    for s in snapshots {
        println!(
            "{}  {:<32} #{:<6} session {}",
            rfc3339(s.timestamp),
            s.sample_key(),
            s.occurrence,
            s.session_id
        );
        println!("    {}", s.metrics);
    }
    Ok(())
}

/// `waymark qa capture <event>`
pub fn capture(repo_root: &Path, event: &str, sub_key: Option<&str>) -> anyhow::Result<()> {
    let ws = Workspace::open(repo_root)?;
    let _lock = ws.lock()?;
    let evaluator = ws.evaluator(MilestoneCallbacks::none())?;
    let mut collector = with_providers(ws.collector()?, &ws, &evaluator);
    let snapshot = collector.force_capture(event, sub_key);
    ws.save_sampler(collector.sampler())?;
    println!(
        "Captured {} (occurrence {}, session {})",
        snapshot.sample_key(),
        snapshot.occurrence,
        snapshot.session_id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_capture_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        crate::cmd_init::execute(dir.path()).unwrap();
        capture(dir.path(), "session_end", None).unwrap();
        capture(dir.path(), "session_end", None).unwrap();
        capture(dir.path(), "session_end", None).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        let sampler = ws.sampler().unwrap();
        let occurrences: Vec<u64> = sampler.snapshots("session_end").map(|s| s.occurrence).collect();
        assert_eq!(occurrences, [1, 2, 3]);
        show(dir.path(), Some("session_end"), false).unwrap();
        show(dir.path(), None, true).unwrap();
    }
}
