use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use waymark_core::milestone::UserMilestoneConfig;
use waymark_milestone::config::{parse_document, MilestoneDocument};
use waymark_milestone::EvaluatorConfig;
use waymark_sampler::SamplerConfig;

/// Contents of `.waymark/milestones.yaml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct WaymarkConfig {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub milestones: Vec<UserMilestoneConfig>,
}

/// A loaded config plus the non-fatal findings of validation.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub config: WaymarkConfig,
    pub warnings: Vec<String>,
}

impl WaymarkConfig {
    /// Load from `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> anyhow::Result<LoadedConfig> {
        if !path.exists() {
            return Ok(LoadedConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(yaml: &str) -> anyhow::Result<LoadedConfig> {
        let (config, warnings) = parse_document::<WaymarkConfig>(yaml)?;
        Ok(LoadedConfig { config, warnings })
    }
}

impl MilestoneDocument for WaymarkConfig {
    fn milestones(&self) -> &[UserMilestoneConfig] {
        &self.milestones
    }
}

/// Written by `waymark init`.
pub const STARTER_CONFIG: &str = "\
evaluator:
  max_history: 1000
  max_event_history: 1000
sampler:
  max_snapshots_per_type: 50
milestones:
  - id: first-draft
    name: First draft
    priority: 0
    trigger: \"refinement >= 0.3\"
    consequences:
      - type: property_enum_change
        property: status
        value: draft
  - id: polished
    name: Polished
    priority: 10
    trigger:
      type: composite
      operator: and
      triggers:
        - \"refinement >= 0.7\"
        - \"health >= 0.5\"
    snapshot_form:
      operation: commit
      message_template: \"milestone: {{milestone}} reached in {{document}} ({{refinement}})\"
    consequences:
      - type: property_enum_change
        property: status
        value: polished
      - type: array_mutation
        property: tags
        operation: add
        value: polished
  - id: daily-review
    name: Daily review
    priority: 20
    repeatable: true
    cooldown_hours: 24
    trigger:
      type: event_sequence
      sequence:
        - event: open
        - event: review
          max_gap_minutes: 30
    consequences:
      - type: refinement_bump
        delta: 0.05
        max: 1.0
";
