use crate::config::STARTER_CONFIG;
use std::path::Path;
use waymark_store::WaymarkPaths;

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = WaymarkPaths::discover(repo_root);

    if paths.is_initialized() {
        paths.ensure_layout()?;
        println!("Already initialized at {}", paths.waymark_dir.display());
        return Ok(());
    }

    paths.ensure_layout()?;
    if !paths.config_yaml.exists() {
        waymark_store::write_atomic(&paths.config_yaml, STARTER_CONFIG.as_bytes())?;
    }

    println!("Initialized {}", paths.waymark_dir.display());
    println!("  edit {} to declare milestones", paths.config_yaml.display());
    Ok(())
}
