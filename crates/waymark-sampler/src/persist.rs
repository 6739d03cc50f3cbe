use crate::snapshot::QaMilestoneSnapshot;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Persisted sampler state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerExport {
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    /// `"key:value"` entries, sorted.
    #[serde(default)]
    pub captured_checkpoints: Vec<String>,
    #[serde(default)]
    pub snapshots: BTreeMap<String, Vec<QaMilestoneSnapshot>>,
}

pub fn load_export(path: &Path) -> Result<Option<SamplerExport>> {
    waymark_store::read_json(path)
        .with_context(|| format!("loading sampler state: {}", path.display()))
}

pub fn save_export(path: &Path, export: &SamplerExport) -> Result<()> {
    waymark_store::write_json(path, export)
        .with_context(|| format!("saving sampler state: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::PowerLawSampler;

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sampler.json");
        assert!(load_export(&path).unwrap().is_none());

        let mut sampler = PowerLawSampler::new();
        sampler.increment_and_check("open", None);
        sampler.increment_and_check("save", Some("auto"));
        save_export(&path, &sampler.export()).unwrap();

        let loaded = load_export(&path).unwrap().unwrap();
        assert_eq!(loaded.captured_checkpoints, ["open:1", "save:auto:1"]);
        assert_eq!(loaded.counters["save:auto"], 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampler.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_export(&path).unwrap_err();
        assert!(format!("{err:#}").contains("loading sampler state"));
    }
}
