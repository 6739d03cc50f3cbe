use crate::clock::iso_date;
use crate::types::Timestamp;
use std::collections::BTreeMap;

/// Variable name → rendered value.
pub type TemplateVars = BTreeMap<String, String>;

pub const DEFAULT_MESSAGE_TEMPLATE: &str = "milestone: {{milestone}} reached in {{document}}";
pub const DEFAULT_BRANCH_TEMPLATE: &str = "milestone/{{document}}-{{date}}";
pub const DEFAULT_TAG_TEMPLATE: &str = "{{document}}-{{milestone}}-{{date}}";

/// Standard milestone variables: `document`, `refinement`, `milestone`, `date`.
pub fn milestone_variables(
    document_path: &str,
    refinement: f64,
    milestone_name: &str,
    now: Timestamp,
) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("document".into(), document_stem(document_path));
    vars.insert("refinement".into(), format!("{refinement:.2}"));
    vars.insert("milestone".into(), milestone_name.to_string());
    vars.insert("date".into(), iso_date(now));
    vars
}

/// Basename with the final extension stripped: `notes/My Doc.md` → `My Doc`.
pub fn document_stem(document_path: &str) -> String {
    let normalized = document_path.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or("");
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[..idx].to_string(),
        _ => base.to_string(),
    }
}

/// Replace `{{ name }}` placeholders. Unknown names and unclosed braces are kept as-is.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_start = &rest[start + 2..];
        if let Some(end) = after_start.find("}}") {
            let name = after_start[..end].trim();
            match vars.get(name) {
                Some(val) => result.push_str(val),
                None => result.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_start[end + 2..];
        } else {
            result.push_str(&rest[start..]);
            rest = "";
        }
    }
    result.push_str(rest);
    result
}

/// Make a rendered string usable as a git branch or tag name.
pub fn sanitize_ref_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        let forbidden = c.is_whitespace()
            || c.is_control()
            || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\' | '@' | '{' | '}');
        if forbidden || c == '-' {
            if !last_dash {
                out.push('-');
                last_dash = true;
            }
        } else {
            out.push(c);
            last_dash = false;
        }
    }
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    while out.contains("//") {
        out = out.replace("//", "/");
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.' || c == '/');
    let trimmed = trimmed.strip_suffix(".lock").unwrap_or(trimmed);
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        milestone_variables("notes/deep/My Doc.md", 0.756, "Polished", 1_768_478_400_000)
    }

    #[test]
    fn standard_variables() {
        let v = vars();
        assert_eq!(v["document"], "My Doc");
        assert_eq!(v["refinement"], "0.76");
        assert_eq!(v["milestone"], "Polished");
        assert_eq!(v["date"], "2026-01-15");
    }

    #[test]
    fn stem_edge_cases() {
        assert_eq!(document_stem("a/b/c.tar.gz"), "c.tar");
        assert_eq!(document_stem("README"), "README");
        assert_eq!(document_stem(".hidden"), ".hidden");
        assert_eq!(document_stem(r"win\path\doc.md"), "doc");
    }

    #[test]
    fn render_replaces_known_variables() {
        let out = render_template("{{milestone}}: {{ document }} @ {{refinement}}", &vars());
        assert_eq!(out, "Polished: My Doc @ 0.76");
    }

    #[test]
    fn render_keeps_unknown_and_unclosed() {
        let out = render_template("{{nope}} and {{document", &vars());
        assert_eq!(out, "{{nope}} and {{document");
    }

    #[test]
    fn default_templates_render() {
        let v = vars();
        assert_eq!(
            render_template(DEFAULT_BRANCH_TEMPLATE, &v),
            "milestone/My Doc-2026-01-15"
        );
    }

    #[test]
    fn sanitize_for_git() {
        assert_eq!(sanitize_ref_name("milestone/My Doc-2026-01-15"), "milestone/My-Doc-2026-01-15");
        assert_eq!(sanitize_ref_name("  weird:name?? "), "weird-name");
        assert_eq!(sanitize_ref_name("a..b//c"), "a.b/c");
        assert_eq!(sanitize_ref_name("release.lock"), "release");
    }
}
