use std::path::{Path, PathBuf};

/// All well-known paths under `.waymark/`.
#[derive(Debug, Clone)]
pub struct WaymarkPaths {
    pub root: PathBuf,
    pub waymark_dir: PathBuf,
    pub config_yaml: PathBuf,
    pub state_dir: PathBuf,
    pub evaluator_json: PathBuf,
    pub sampler_json: PathBuf,
    pub properties_json: PathBuf,
    pub lock_file: PathBuf,
}

impl WaymarkPaths {
    /// Derive all paths from a repo root. Pure computation, no I/O.
    pub fn discover(repo_root: impl Into<PathBuf>) -> Self {
        let root = repo_root.into();
        let waymark_dir = root.join(".waymark");
        let state_dir = waymark_dir.join("state");
        Self {
            config_yaml: waymark_dir.join("milestones.yaml"),
            evaluator_json: state_dir.join("evaluator.json"),
            sampler_json: state_dir.join("sampler.json"),
            properties_json: waymark_dir.join("properties.json"),
            lock_file: waymark_dir.join("LOCK"),
            state_dir,
            waymark_dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        Ok(())
    }

    /// Check whether `.waymark/` exists.
    pub fn is_initialized(&self) -> bool {
        self.waymark_dir.is_dir()
    }

    /// Walk up from `start` looking for a directory containing `.waymark/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".waymark").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_builds_correct_paths() {
        let p = WaymarkPaths::discover("/tmp/repo");
        assert_eq!(p.waymark_dir, PathBuf::from("/tmp/repo/.waymark"));
        assert_eq!(p.config_yaml, PathBuf::from("/tmp/repo/.waymark/milestones.yaml"));
        assert_eq!(
            p.evaluator_json,
            PathBuf::from("/tmp/repo/.waymark/state/evaluator.json")
        );
        assert_eq!(p.sampler_json, PathBuf::from("/tmp/repo/.waymark/state/sampler.json"));
        assert_eq!(p.lock_file, PathBuf::from("/tmp/repo/.waymark/LOCK"));
    }

    #[test]
    fn ensure_layout_and_find_root() {
        let tmp = tempfile::tempdir().unwrap();
        let p = WaymarkPaths::discover(tmp.path());
        assert!(!p.is_initialized());
        p.ensure_layout().unwrap();
        assert!(p.is_initialized());
        assert!(p.state_dir.is_dir());

        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(WaymarkPaths::find_root(&nested).unwrap(), tmp.path());
    }
}
