use crate::cmd_record::with_providers;
use crate::git::{DryRunSnapshot, GitCli};
use crate::property_store::{self, normalize_document, parse_assignment, PropertyStore};
use crate::workspace::Workspace;
use std::path::Path;
use std::sync::Arc;
use waymark_core::{DocumentState, PropertyMap};
use waymark_milestone::{GitSnapshotExecutor, MilestoneCallbacks, MilestoneTriggeredEvent};

pub struct EvaluateParams<'a> {
    pub repo_root: &'a Path,
    pub document: &'a str,
    pub refinement: Option<f64>,
    pub health: Option<f64>,
    pub stub_count: Option<u32>,
    pub usefulness_margin: Option<f64>,
    pub potential_energy: Option<f64>,
    pub tags: &'a [String],
    pub props: &'a [String],
    pub no_git: bool,
    pub json: bool,
}

/// `waymark evaluate <doc>`
pub fn execute(params: &EvaluateParams<'_>) -> anyhow::Result<()> {
    let ws = Workspace::open(params.repo_root)?;
    let _lock = ws.lock()?;

    let document = normalize_document(params.document);
    let store = Arc::new(PropertyStore::new(&ws.paths.properties_json));
    let mut properties = store.get(&document)?;
    for assignment in params.props {
        let (key, value) = parse_assignment(assignment)?;
        properties.insert(key, value);
    }
    let state = document_state(params, &document, &properties)?;
    let tags = if params.tags.is_empty() {
        property_store::tags(&properties)
    } else {
        params.tags.to_vec()
    };

    let git: Arc<dyn GitSnapshotExecutor> = if params.no_git {
        Arc::new(DryRunSnapshot)
    } else {
        Arc::new(GitCli::new(&ws.paths.root))
    };
    let callbacks = MilestoneCallbacks::none()
        .with_git_snapshot(git)
        .with_property_change(store);

    let mut evaluator = ws.evaluator(callbacks)?;
    let fired = tokio::runtime::Runtime::new()?.block_on(evaluator.evaluate(
        &document,
        &state,
        Some(tags.as_slice()),
        Some(&properties),
    ));
    ws.save_evaluator(&evaluator)?;

    let mut collector = with_providers(ws.collector()?, &ws, &evaluator);
    for event in &fired {
        collector.on_event("milestone", Some(&event.milestone_id));
    }
    ws.save_sampler(collector.sampler())?;

    if params.json {
        println!("{}", serde_json::to_string_pretty(&fired)?);
    } else {
        print_fired(&document, &fired);
    }
    Ok(())
}

/// Metrics from flags, falling back to numeric properties of the same name.
fn document_state(
    params: &EvaluateParams<'_>,
    document: &str,
    properties: &PropertyMap,
) -> anyhow::Result<DocumentState> {
    let metric = |flag: Option<f64>, key: &str| flag.or_else(|| property_store::number(properties, key));
    let refinement = metric(params.refinement, "refinement").ok_or_else(|| {
        anyhow::anyhow!(
            "no refinement for {document}: pass --refinement or `waymark prop set {document} refinement <value>`"
        )
    })?;
    let stub_count = params.stub_count.or_else(|| {
        properties
            .get("stub_count")
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    });
    Ok(DocumentState {
        refinement,
        health: metric(params.health, "health"),
        stub_count,
        usefulness_margin: metric(params.usefulness_margin, "usefulness_margin"),
        potential_energy: metric(params.potential_energy, "potential_energy"),
    })
}

fn print_fired(document: &str, fired: &[MilestoneTriggeredEvent]) {
    if fired.is_empty() {
        println!("No milestones reached for {document}");
        return;
    }
    for event in fired {
        let status = if event.success { "fired " } else { "FAILED" };
        println!("{status} {} ({})", event.milestone_id, event.milestone_name);
        if let Some(git) = &event.git_result {
            if let Some(sha) = &git.commit_sha {
                println!("  commit {}", &sha[..sha.len().min(10)]);
            }
            if let Some(branch) = &git.branch_name {
                println!("  branch {branch}");
            }
            if let Some(tag) = &git.tag_name {
                println!("  tag    {tag}");
            }
        }
        for c in &event.consequence_results {
            match (&c.property, &c.value, &c.error) {
                (_, _, Some(err)) => println!("  {} failed: {err}", c.consequence_type),
                (Some(property), Some(value), None) => println!("  {property} = {value}"),
                _ => {}
            }
        }
        if let Some(err) = &event.error {
            println!("  error: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_store::WaymarkPaths;

    fn params<'a>(root: &'a Path, document: &'a str) -> EvaluateParams<'a> {
        EvaluateParams {
            repo_root: root,
            document,
            refinement: None,
            health: None,
            stub_count: None,
            usefulness_margin: None,
            potential_energy: None,
            tags: &[],
            props: &[],
            no_git: true,
            json: false,
        }
    }

    fn workspace(config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let paths = WaymarkPaths::discover(dir.path());
        paths.ensure_layout().unwrap();
        std::fs::write(&paths.config_yaml, config).unwrap();
        dir
    }

    const CONFIG: &str = r#"
milestones:
  - id: polished
    name: Polished
    trigger: "refinement >= 0.7"
    snapshot_form: { operation: tag }
    consequences:
      - { type: property_enum_change, property: status, value: polished }
      - { type: array_mutation, property: tags, operation: add, value: polished }
"#;

    #[test]
    fn fires_once_and_writes_properties() {
        let dir = workspace(CONFIG);
        let mut p = params(dir.path(), "notes/a.md");
        p.refinement = Some(0.8);
        execute(&p).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        let store = PropertyStore::new(&ws.paths.properties_json);
        let props = store.get("notes/a.md").unwrap();
        assert_eq!(props["status"], "polished");
        assert_eq!(props["tags"], serde_json::json!(["polished"]));

        execute(&p).unwrap();
        let evaluator = ws.evaluator(MilestoneCallbacks::none()).unwrap();
        assert_eq!(evaluator.history().count(), 1);
        assert!(evaluator.has_fired("polished", "notes/a.md"));

        let sampler = ws.sampler().unwrap();
        assert_eq!(sampler.counter("milestone:polished"), 1);
    }

    #[test]
    fn refinement_falls_back_to_property_store() {
        let dir = workspace(CONFIG);
        let ws = Workspace::open(dir.path()).unwrap();
        PropertyStore::new(&ws.paths.properties_json)
            .set("b.md", "refinement", serde_json::json!(0.9))
            .unwrap();

        execute(&params(dir.path(), "./b.md")).unwrap();
        let evaluator = ws.evaluator(MilestoneCallbacks::none()).unwrap();
        assert!(evaluator.has_fired("polished", "b.md"));
    }

    #[test]
    fn prop_overrides_apply_for_one_pass() {
        let dir = workspace(CONFIG);
        let props = vec!["refinement=0.75".to_string()];
        let mut p = params(dir.path(), "c.md");
        p.props = &props;
        execute(&p).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        let stored = PropertyStore::new(&ws.paths.properties_json).get("c.md").unwrap();
        assert!(!stored.contains_key("refinement"));
        assert_eq!(stored["status"], "polished");
    }

    #[test]
    fn missing_refinement_is_an_error() {
        let dir = workspace(CONFIG);
        let err = execute(&params(dir.path(), "d.md")).unwrap_err();
        assert!(err.to_string().contains("--refinement"));
    }

    #[test]
    fn stub_mutation_is_recorded_as_failure() {
        let dir = workspace(
            r#"
milestones:
  - id: stubs
    name: Stubs
    trigger: "refinement >= 0.1"
    consequences:
      - { type: stub_mutation, filter: { kind: todo }, mutation: { resolved: true } }
"#,
        );
        let mut p = params(dir.path(), "e.md");
        p.refinement = Some(0.5);
        execute(&p).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        let evaluator = ws.evaluator(MilestoneCallbacks::none()).unwrap();
        let entry = evaluator.history().next().unwrap();
        assert!(!entry.success);
        assert!(entry
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("no stub mutation handler configured"));
        assert!(!evaluator.has_fired("stubs", "e.md"));
    }
}
