use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use waymark_core::PropertyMap;
use waymark_milestone::{ActionResult, PropertyChangeApplier};

/// Per-document properties in `.waymark/properties.json`
/// (document path -> property map).
pub struct PropertyStore {
    path: PathBuf,
}

impl PropertyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> anyhow::Result<BTreeMap<String, PropertyMap>> {
        Ok(waymark_store::read_json(&self.path)?.unwrap_or_default())
    }

    /// Properties of one document; empty if it has none.
    pub fn get(&self, document: &str) -> anyhow::Result<PropertyMap> {
        Ok(self
            .load_all()?
            .remove(&normalize_document(document))
            .unwrap_or_default())
    }

    pub fn set(&self, document: &str, property: &str, value: Value) -> anyhow::Result<()> {
        let mut all = self.load_all()?;
        all.entry(normalize_document(document))
            .or_default()
            .insert(property.to_string(), value);
        waymark_store::write_json(&self.path, &all)
    }

    /// Returns true if the property existed.
    pub fn unset(&self, document: &str, property: &str) -> anyhow::Result<bool> {
        let mut all = self.load_all()?;
        let key = normalize_document(document);
        let removed = all
            .get_mut(&key)
            .map(|props| props.remove(property).is_some())
            .unwrap_or(false);
        if removed {
            if all.get(&key).is_some_and(|p| p.is_empty()) {
                all.remove(&key);
            }
            waymark_store::write_json(&self.path, &all)?;
        }
        Ok(removed)
    }

    /// `stub_count` of every document that has one.
    pub fn stub_distribution(&self) -> Value {
        match self.load_all() {
            Ok(all) => {
                let dist: serde_json::Map<String, Value> = all
                    .into_iter()
                    .filter_map(|(doc, props)| props.get("stub_count").cloned().map(|v| (doc, v)))
                    .collect();
                Value::Object(dist)
            }
            Err(e) => json!({ "error": format!("{e:#}") }),
        }
    }
}

#[async_trait::async_trait]
impl PropertyChangeApplier for PropertyStore {
    async fn apply_property_change(
        &self,
        document_path: &str,
        property: &str,
        value: &Value,
    ) -> ActionResult {
        match self.set(document_path, property, value.clone()) {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("{e:#}")),
        }
    }
}

/// Forward slashes, no leading `./`.
pub fn normalize_document(document: &str) -> String {
    let path = document.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

/// Parse a string value into an appropriate JSON value (bool/number/array/string).
pub fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ if s.starts_with('[') => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
        }
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Split `key=value`.
pub fn parse_assignment(s: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected key=value, got \"{s}\""))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty property name in \"{s}\"");
    }
    Ok((key.to_string(), parse_value(value.trim())))
}

/// Read a numeric property.
pub fn number(props: &PropertyMap, key: &str) -> Option<f64> {
    props.get(key).and_then(Value::as_f64)
}

/// String elements of the `tags` property; a bare string counts as one tag.
pub fn tags(props: &PropertyMap) -> Vec<String> {
    match props.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(tag)) => vec![tag.clone()],
        _ => Vec::new(),
    }
}
