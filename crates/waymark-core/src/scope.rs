use crate::milestone::{MilestoneScope, UserMilestoneConfig};
use crate::types::{values_equal, PropertyMap};
use regex::Regex;
use serde_json::Value;

/// Whether `milestone` applies to the given document.
pub fn milestone_applies(
    milestone: &UserMilestoneConfig,
    document_path: &str,
    tags: Option<&[String]>,
    properties: Option<&PropertyMap>,
) -> bool {
    scope_matches(&milestone.scope, document_path, tags, properties)
}

/// Evaluate a scope predicate. Missing inputs (no tags for tag mode, no
/// properties for property mode) never match.
pub fn scope_matches(
    scope: &MilestoneScope,
    document_path: &str,
    tags: Option<&[String]>,
    properties: Option<&PropertyMap>,
) -> bool {
    match scope {
        MilestoneScope::All => true,
        MilestoneScope::Folder { pattern } => folder_matches(pattern, document_path),
        MilestoneScope::Tag { tags: wanted } => match tags {
            Some(have) => wanted.iter().any(|w| {
                let w = normalize_tag(w);
                have.iter().any(|h| normalize_tag(h) == w)
            }),
            None => false,
        },
        MilestoneScope::Property {
            property,
            operator,
            value,
        } => match properties {
            Some(props) => property_matches(props.get(property), operator, value.as_ref()),
            None => false,
        },
    }
}

/// Translate a folder glob into an anchored regex: `**` → `.*`, `*` → `[^/]*`.
/// Anchored at the start of the path only, so `notes/*` also covers files
/// in nested folders under `notes/<x>/`.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
    out
}

fn folder_matches(pattern: &str, document_path: &str) -> bool {
    let path = document_path.replace('\\', "/");
    let pattern = pattern.replace('\\', "/");
    match Regex::new(&glob_to_regex(&pattern)) {
        Ok(re) => re.is_match(&path),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "invalid folder scope pattern");
            false
        }
    }
}

fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('#')
}

fn property_matches(actual: Option<&Value>, operator: &str, expected: Option<&Value>) -> bool {
    match operator {
        "exists" => actual.is_some_and(|v| !v.is_null()),
        "==" => match (actual, expected) {
            (Some(a), Some(e)) => values_equal(a, e),
            _ => false,
        },
        "!=" => match expected {
            Some(e) => !actual.is_some_and(|a| values_equal(a, e)),
            None => false,
        },
        "contains" => match (actual, expected) {
            (Some(Value::Array(items)), Some(e)) => items.iter().any(|i| values_equal(i, e)),
            (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
            _ => false,
        },
        other => {
            tracing::debug!(operator = other, "unknown property scope operator");
            false
        }
    }
}
