use crate::config::WaymarkConfig;
use std::path::Path;
use waymark_milestone::{persist, MilestoneCallbacks, MilestoneEvaluator};
use waymark_sampler::{PowerLawSampler, QaMilestoneCollector};
use waymark_store::{LockGuard, WaymarkPaths};

/// An initialized `.waymark/` workspace with its config loaded.
pub struct Workspace {
    pub paths: WaymarkPaths,
    pub config: WaymarkConfig,
}

impl Workspace {
    pub fn open(repo_root: &Path) -> anyhow::Result<Self> {
        let paths = WaymarkPaths::discover(repo_root);
        if !paths.is_initialized() {
            anyhow::bail!("No .waymark/ workspace found. Run `waymark init` first.");
        }
        let config = WaymarkConfig::load(&paths.config_yaml)?.config;
        Ok(Self { paths, config })
    }

    /// Exclusive lock for commands that write state.
    pub fn lock(&self) -> anyhow::Result<LockGuard> {
        waymark_store::try_lock(&self.paths.lock_file)
    }

    /// Evaluator over the configured milestones, restored from saved state.
    pub fn evaluator(&self, callbacks: MilestoneCallbacks) -> anyhow::Result<MilestoneEvaluator> {
        let mut evaluator = MilestoneEvaluator::new(self.config.milestones.clone(), callbacks)
            .with_config(self.config.evaluator);
        if let Some(state) = persist::load_export(&self.paths.evaluator_json)? {
            evaluator.import(state);
        }
        Ok(evaluator)
    }

    pub fn save_evaluator(&self, evaluator: &MilestoneEvaluator) -> anyhow::Result<()> {
        persist::save_export(&self.paths.evaluator_json, &evaluator.export())
    }

    pub fn sampler(&self) -> anyhow::Result<PowerLawSampler> {
        let mut sampler = PowerLawSampler::with_config(self.config.sampler);
        if let Some(state) = waymark_sampler::persist::load_export(&self.paths.sampler_json)? {
            sampler.import(state);
        }
        Ok(sampler)
    }

    pub fn save_sampler(&self, sampler: &PowerLawSampler) -> anyhow::Result<()> {
        waymark_sampler::persist::save_export(&self.paths.sampler_json, &sampler.export())
    }

    /// Collector over the saved sampler. The session id comes from
    /// `WAYMARK_SESSION`, or a fresh ULID per invocation.
    pub fn collector(&self) -> anyhow::Result<QaMilestoneCollector> {
        let session_id =
            std::env::var("WAYMARK_SESSION").unwrap_or_else(|_| ulid::Ulid::new().to_string());
        Ok(QaMilestoneCollector::new(self.sampler()?, session_id))
    }
}
