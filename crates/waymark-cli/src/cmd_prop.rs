use crate::property_store::{parse_value, PropertyStore};
use clap::Subcommand;
use std::path::Path;
use waymark_store::WaymarkPaths;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum PropCmd {
    /// Set a document property
    Set {
        /// Document path
        document: String,
        /// Property name (e.g. refinement, status, tags)
        key: String,
        /// Value (true/false/number/["json","array"]/string)
        value: String,
    },
    /// Remove a document property
    Unset { document: String, key: String },
    /// Show a document's properties (all documents if omitted)
    Show { document: Option<String> },
}

// ── Dispatch ──

pub fn run(cmd: PropCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        PropCmd::Set {
            document,
            key,
            value,
        } => set(repo_root, &document, &key, &value),
        PropCmd::Unset { document, key } => unset(repo_root, &document, &key),
        PropCmd::Show { document } => show(repo_root, document.as_deref()),
    }
}

// ── Command Implementations ──

fn open_store(repo_root: &Path) -> anyhow::Result<PropertyStore> {
    let paths = WaymarkPaths::discover(repo_root);
    if !paths.is_initialized() {
        anyhow::bail!("No .waymark/ workspace found. Run `waymark init` first.");
    }
    Ok(PropertyStore::new(paths.properties_json))
}

/// `waymark prop set <doc> <key> <value>`
pub fn set(repo_root: &Path, document: &str, key: &str, value: &str) -> anyhow::Result<()> {
    let store = open_store(repo_root)?;
    let _lock = waymark_store::try_lock(&WaymarkPaths::discover(repo_root).lock_file)?;
    let value = parse_value(value);
    store.set(document, key, value.clone())?;
    println!("{key} = {value}");
    Ok(())
}

/// `waymark prop unset <doc> <key>`
pub fn unset(repo_root: &Path, document: &str, key: &str) -> anyhow::Result<()> {
    let store = open_store(repo_root)?;
    let _lock = waymark_store::try_lock(&WaymarkPaths::discover(repo_root).lock_file)?;
    if store.unset(document, key)? {
        println!("{key} removed");
    } else {
        println!("(not set)");
    }
    Ok(())
}

/// `waymark prop show [doc]`
pub fn show(repo_root: &Path, document: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(repo_root)?;
    match document {
        Some(doc) => {
            let props = store.get(doc)?;
            if props.is_empty() {
                println!("(no properties)");
            }
            for (k, v) in &props {
                println!("{k} = {v}");
            }
        }
        None => {
            let all = store.load_all()?;
            if all.is_empty() {
                println!("(no properties)");
            }
            for (doc, props) in &all {
                println!("{doc}");
                for (k, v) in props {
                    println!("  {k} = {v}");
                }
            }
        }
    }
    Ok(())
}
