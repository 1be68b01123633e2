//! Manifest schema validation.
//!
//! Every field is checked and all violations are collected into a single
//! [`ValidationError`], so callers can report every problem in one pass.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::manifest::{
    KNOWN_FIELDS, MAX_COMPATIBILITY_CHARS, MAX_DESCRIPTION_CHARS, MAX_MANIFEST_BYTES,
    MAX_NAME_CHARS, Manifest, StringOrList,
};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid name regex"));

/// Whether `name` is lowercase alphanumeric segments joined by single hyphens, 1-64 chars.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_NAME_CHARS).contains(&len) && NAME_RE.is_match(name)
}

/// Describe why `name` is invalid, or `None` if it is acceptable.
#[must_use]
pub fn name_violation(name: &str) -> Option<String> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Some(format!(
            "name: must be 1-{MAX_NAME_CHARS} characters (got {len})"
        ));
    }
    if !NAME_RE.is_match(name) {
        return Some(format!(
            "name: '{name}' must be lowercase letters and digits separated by single hyphens"
        ));
    }
    None
}

/// Validate an assembled manifest object and convert it into a [`Manifest`].
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every violated rule, or the measured
/// size when the canonical encoding exceeds 512 KiB.
pub fn validate_manifest(fields: &Map<String, Value>) -> Result<Manifest, ValidationError> {
    let mut violations = Vec::new();

    for key in fields.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            violations.push(format!("unknown field '{key}'"));
        }
    }

    let name = required_string(fields, "name", &mut violations);
    if let Some(name) = &name
        && let Some(v) = name_violation(name)
    {
        violations.push(v);
    }

    let description = required_string(fields, "description", &mut violations);
    if let Some(description) = &description {
        let len = description.chars().count();
        if len == 0 || len > MAX_DESCRIPTION_CHARS {
            violations.push(format!(
                "description: must be 1-{MAX_DESCRIPTION_CHARS} characters (got {len})"
            ));
        }
    }

    let license = optional_string(fields, "license", &mut violations);

    let compatibility = optional_string_or_list(fields, "compatibility", &mut violations);
    if let Some(compat) = &compatibility {
        let len = compat.char_len();
        if len > MAX_COMPATIBILITY_CHARS {
            violations.push(format!(
                "compatibility: must be at most {MAX_COMPATIBILITY_CHARS} characters (got {len})"
            ));
        }
    }

    let metadata = optional_metadata(fields, &mut violations);
    let allowed_tools = optional_string_or_list(fields, "allowed-tools", &mut violations);
    let body = optional_string(fields, "body", &mut violations);
    if let Some(body) = &body
        && (body.is_empty() || body.trim() != body)
    {
        violations.push("body: must be non-empty without leading or trailing whitespace".into());
    }

    let (Some(name), Some(description)) = (name, description) else {
        return Err(ValidationError { violations });
    };
    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    let manifest = Manifest {
        name,
        description,
        license,
        compatibility,
        metadata,
        allowed_tools,
        body,
    };
    check_size(&manifest)?;
    Ok(manifest)
}

/// Re-check an already typed manifest, e.g. one supplied by an edit.
///
/// # Errors
///
/// Returns a [`ValidationError`] with every violated rule.
pub fn revalidate(manifest: &Manifest) -> Result<(), ValidationError> {
    let Value::Object(fields) = serde_json::to_value(manifest)
        .map_err(|e| ValidationError::single(format!("manifest: {e}")))?
    else {
        return Err(ValidationError::single("manifest: must be an object"));
    };
    validate_manifest(&fields).map(|_| ())
}

fn check_size(manifest: &Manifest) -> Result<(), ValidationError> {
    let size = manifest
        .serialized_len()
        .map_err(|e| ValidationError::single(format!("manifest: {e}")))?;
    if size > MAX_MANIFEST_BYTES {
        let kib = size.div_ceil(1024);
        return Err(ValidationError::single(format!(
            "manifest is {kib} KiB, exceeding the {} KiB limit",
            MAX_MANIFEST_BYTES / 1024
        )));
    }
    Ok(())
}

fn required_string(
    fields: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => {
            violations.push(format!("{key}: required"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(format!("{key}: must be a string"));
            None
        }
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(format!("{key}: must be a string"));
            None
        }
    }
}

fn optional_string_or_list(
    fields: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<String>,
) -> Option<StringOrList> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(StringOrList::One(s.clone())),
        Some(Value::Array(items)) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect();
            if strings.is_none() {
                violations.push(format!("{key}: list items must be strings"));
            }
            strings.map(StringOrList::Many)
        }
        Some(_) => {
            violations.push(format!("{key}: must be a string or a list of strings"));
            None
        }
    }
}

fn optional_metadata(
    fields: &Map<String, Value>,
    violations: &mut Vec<String>,
) -> Option<BTreeMap<String, String>> {
    match fields.get("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                if let Value::String(s) = v {
                    out.insert(k.clone(), s.clone());
                } else {
                    violations.push(format!("metadata.{k}: must be a string"));
                }
            }
            Some(out)
        }
        Some(_) => {
            violations.push("metadata: must be a mapping of strings".into());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    #[test]
    fn accepts_minimal_manifest() {
        let m = validate_manifest(&object(json!({
            "name": "my-skill",
            "description": "A valid skill",
        })))
        .unwrap();
        assert_eq!(m.name, "my-skill");
        assert!(m.body.is_none());
    }

    #[test]
    fn accepts_full_manifest() {
        let m = validate_manifest(&object(json!({
            "name": "pdf-tools",
            "description": "Work with PDFs",
            "license": "MIT",
            "compatibility": ["linux", "macos"],
            "metadata": {"author": "me"},
            "allowed-tools": "Bash Read",
            "body": "# PDF",
        })))
        .unwrap();
        assert_eq!(m.license.as_deref(), Some("MIT"));
        assert_eq!(
            m.compatibility,
            Some(StringOrList::Many(vec!["linux".into(), "macos".into()]))
        );
        assert_eq!(m.metadata.unwrap()["author"], "me");
        assert_eq!(m.allowed_tools, Some(StringOrList::One("Bash Read".into())));
    }

    #[test]
    fn aggregates_every_violation() {
        let err = validate_manifest(&object(json!({
            "name": "Bad_Name",
            "description": "",
            "license": 42,
            "compatibility": "x".repeat(501),
            "extra": true,
        })))
        .unwrap_err();

        assert_eq!(err.violations.len(), 5, "{err}");
        let msg = err.to_string();
        assert!(msg.contains("unknown field 'extra'"));
        assert!(msg.contains("Bad_Name"));
        assert!(msg.contains("description"));
        assert!(msg.contains("license"));
        assert!(msg.contains("compatibility"));
    }

    #[test]
    fn missing_required_fields() {
        let err = validate_manifest(&Map::new()).unwrap_err();
        assert_eq!(
            err.violations,
            vec!["name: required".to_owned(), "description: required".to_owned()]
        );
    }

    #[test]
    fn non_string_metadata_rejected() {
        let err = validate_manifest(&object(json!({
            "name": "x",
            "description": "y",
            "metadata": {"n": 1},
        })))
        .unwrap_err();
        assert!(err.to_string().contains("metadata.n"));
    }

    #[test]
    fn list_with_non_strings_rejected() {
        let err = validate_manifest(&object(json!({
            "name": "x",
            "description": "y",
            "allowed-tools": ["Bash", 3],
        })))
        .unwrap_err();
        assert!(err.to_string().contains("allowed-tools"));
    }

    #[test]
    fn description_length_boundaries() {
        let ok = object(json!({"name": "x", "description": "d".repeat(1024)}));
        assert!(validate_manifest(&ok).is_ok());
        let too_long = object(json!({"name": "x", "description": "d".repeat(1025)}));
        assert!(validate_manifest(&too_long).is_err());
    }

    #[test]
    fn compatibility_list_measured_joined() {
        let items: Vec<String> = (0..100).map(|_| "abc".to_owned()).collect();
        // 100 * 3 + 99 * 2 = 498
        let ok = object(json!({"name": "x", "description": "y", "compatibility": items}));
        assert!(validate_manifest(&ok).is_ok());
    }

    #[test]
    fn oversized_manifest_reports_kib() {
        let err = validate_manifest(&object(json!({
            "name": "x",
            "description": "y",
            "body": "b".repeat(600 * 1024),
        })))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("601 KiB"), "{msg}");
        assert!(msg.contains("512 KiB"));
    }

    #[test]
    fn validation_is_deterministic() {
        let input = object(json!({"name": "-bad-", "description": 7}));
        let a = validate_manifest(&input).unwrap_err();
        let b = validate_manifest(&input).unwrap_err();
        assert_eq!(a, b);
    }

    #[test]
    fn name_rules() {
        let max = "a".repeat(64);
        for ok in ["a", "my-skill", "pdf2-tools-v3", max.as_str()] {
            assert!(is_valid_name(ok), "{ok}");
        }
        let over = "a".repeat(65);
        for bad in ["", "-a", "a-", "a--b", "A", "a_b", "a b", "é", over.as_str()] {
            assert!(!is_valid_name(bad), "{bad}");
        }
    }

    #[test]
    fn revalidate_typed_manifest() {
        let mut m = Manifest::new("ok-name", "desc");
        assert!(revalidate(&m).is_ok());
        m.name = "Not OK".into();
        assert!(revalidate(&m).is_err());
    }

    #[test]
    fn body_must_survive_a_render_parse_cycle() {
        let mut m = Manifest::new("ok-name", "desc");
        for body in ["", "  padded", "trailing\n"] {
            m.body = Some(body.into());
            let err = revalidate(&m).unwrap_err();
            assert_eq!(err.violations.len(), 1, "{body:?}");
            assert!(err.violations[0].starts_with("body:"));
        }
        m.body = Some("# Usage\n\nRun it.".into());
        assert!(revalidate(&m).is_ok());
    }

    mod proptest_names {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn generated_valid_names_accepted(name in "[a-z0-9]{1,10}(-[a-z0-9]{1,10}){0,4}") {
                prop_assert!(is_valid_name(&name));
            }

            #[test]
            fn acceptance_matches_definition(name in "[a-zA-Z0-9_ -]{0,70}") {
                let segments_ok = !name.is_empty()
                    && name.split('-').all(|seg| {
                        !seg.is_empty()
                            && seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                    });
                let expected = segments_ok && name.len() <= 64;
                prop_assert_eq!(is_valid_name(&name), expected);
            }
        }
    }
}
