use crate::config::WaymarkConfig;
use std::path::Path;
use waymark_store::WaymarkPaths;

/// `waymark validate`
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = WaymarkPaths::discover(repo_root);
    if !paths.config_yaml.exists() {
        anyhow::bail!(
            "{} not found. Run `waymark init` first.",
            paths.config_yaml.display()
        );
    }
    let loaded = WaymarkConfig::load(&paths.config_yaml)?;
    let milestones = &loaded.config.milestones;

    println!("{} milestone(s) in {}", milestones.len(), paths.config_yaml.display());
    for m in milestones {
        let mut flags = Vec::new();
        if !m.enabled {
            flags.push("disabled".to_string());
        }
        if m.repeatable {
            match m.cooldown_hours {
                Some(h) => flags.push(format!("repeatable, cooldown {h}h")),
                None => flags.push("repeatable".to_string()),
            }
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join("; "))
        };
        println!(
            "  {:>4}  {:<24} {}{}",
            m.priority,
            m.id,
            m.trigger.type_name(),
            flags
        );
    }

    if loaded.warnings.is_empty() {
        println!("OK");
    } else {
        println!("{} warning(s):", loaded.warnings.len());
        for w in &loaded.warnings {
            println!("  - {w}");
        }
    }
    Ok(())
}
