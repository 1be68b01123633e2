use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ManifestError;
use crate::manifest::FileEntry;

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---(?:\r?\n(.*))?\z").expect("valid frontmatter regex")
});

/// Split `SKILL.md` content into its frontmatter text and trailing body.
///
/// The content must begin with a `---` fence line and contain a closing
/// `---` fence line; anything after the closing fence is the body.
///
/// # Errors
///
/// Returns [`ManifestError::NoFrontmatterDelimiters`] if the fences are not
/// found at the very start of the content.
pub fn split_frontmatter(content: &str) -> Result<(&str, &str), ManifestError> {
    let caps = FRONTMATTER_RE
        .captures(content)
        .ok_or(ManifestError::NoFrontmatterDelimiters)?;
    let frontmatter = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());
    Ok((frontmatter, body))
}

/// Parse a standalone `SKILL.md` document into an unvalidated manifest object.
///
/// The frontmatter keys are kept as-is, `metadata` values are coerced to
/// strings, and the trimmed body is stored under `body` unless it is empty.
///
/// # Errors
///
/// Returns an error if the fences are missing, the YAML is malformed, or the
/// frontmatter is not a mapping.
pub fn parse_manifest_str(content: &str) -> Result<Map<String, Value>, ManifestError> {
    let (frontmatter, body) = split_frontmatter(content)?;

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(frontmatter).map_err(|e| ManifestError::InvalidYaml(e.to_string()))?;
    if !yaml.is_mapping() {
        return Err(ManifestError::NotAMapping);
    }

    let Value::Object(mut fields) =
        serde_json::to_value(&yaml).map_err(|e| ManifestError::InvalidYaml(e.to_string()))?
    else {
        return Err(ManifestError::NotAMapping);
    };

    if let Some(Value::Object(metadata)) = fields.get_mut("metadata") {
        for value in metadata.values_mut() {
            if !value.is_string() {
                *value = Value::String(coerce_to_string(value));
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        fields.remove("body");
    } else {
        fields.insert("body".into(), Value::String(body.to_owned()));
    }

    Ok(fields)
}

/// Locate the root `SKILL.md` among package entries and parse it.
///
/// # Errors
///
/// Returns [`ManifestError::Missing`] when no root manifest exists, otherwise
/// any error from [`parse_manifest_str`].
pub fn parse_manifest(entries: &[FileEntry]) -> Result<Map<String, Value>, ManifestError> {
    let manifest = entries
        .iter()
        .find(|e| e.is_manifest())
        .ok_or(ManifestError::Missing)?;
    parse_manifest_str(&manifest.content)
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_skill() {
        let fields =
            parse_manifest_str("---\nname: test\ndescription: A test skill.\n---\n# Body\nHello")
                .unwrap();
        assert_eq!(fields["name"], "test");
        assert_eq!(fields["description"], "A test skill.");
        assert_eq!(fields["body"], "# Body\nHello");
    }

    #[test]
    fn empty_body_is_omitted() {
        let fields = parse_manifest_str("---\nname: x\ndescription: y\n---\n  \n\n").unwrap();
        assert!(!fields.contains_key("body"));

        let fields = parse_manifest_str("---\nname: x\ndescription: y\n---").unwrap();
        assert!(!fields.contains_key("body"));
    }

    #[test]
    fn body_is_trimmed() {
        let fields = parse_manifest_str("---\nname: x\n---\n\n  text  \n\n").unwrap();
        assert_eq!(fields["body"], "text");
    }

    #[test]
    fn crlf_fences_accepted() {
        let fields = parse_manifest_str("---\r\nname: x\r\n---\r\nbody").unwrap();
        assert_eq!(fields["name"], "x");
        assert_eq!(fields["body"], "body");
    }

    #[test]
    fn missing_frontmatter_delimiter() {
        let err = parse_manifest_str("no frontmatter here").unwrap_err();
        assert!(matches!(err, ManifestError::NoFrontmatterDelimiters));
    }

    #[test]
    fn frontmatter_must_start_at_first_byte() {
        let err = parse_manifest_str("\n---\nname: x\n---\n").unwrap_err();
        assert!(matches!(err, ManifestError::NoFrontmatterDelimiters));
    }

    #[test]
    fn unclosed_frontmatter() {
        let err = parse_manifest_str("---\nname: x\n").unwrap_err();
        assert!(matches!(err, ManifestError::NoFrontmatterDelimiters));
    }

    #[test]
    fn closing_fence_must_be_its_own_line() {
        let err = parse_manifest_str("---\nname: x\n---trailing").unwrap_err();
        assert!(matches!(err, ManifestError::NoFrontmatterDelimiters));
    }

    #[test]
    fn invalid_yaml() {
        let err = parse_manifest_str("---\nname: [unclosed\n---\nbody").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidYaml(_)));
    }

    #[test]
    fn scalar_frontmatter_is_not_a_mapping() {
        let err = parse_manifest_str("---\njust a string\n---\n").unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping));

        let err = parse_manifest_str("---\n- a\n- b\n---\n").unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping));
    }

    #[test]
    fn metadata_values_coerced_to_strings() {
        let fields = parse_manifest_str(
            "---\nname: x\nmetadata:\n  version: 1.5\n  stable: true\n  count: 3\n  owner: me\n---\n",
        )
        .unwrap();
        let metadata = fields["metadata"].as_object().unwrap();
        assert_eq!(metadata["version"], "1.5");
        assert_eq!(metadata["stable"], "true");
        assert_eq!(metadata["count"], "3");
        assert_eq!(metadata["owner"], "me");
    }

    #[test]
    fn file_body_overrides_frontmatter_body() {
        let fields = parse_manifest_str("---\nname: x\nbody: from yaml\n---\nfrom file").unwrap();
        assert_eq!(fields["body"], "from file");

        let fields = parse_manifest_str("---\nname: x\nbody: from yaml\n---\n").unwrap();
        assert!(!fields.contains_key("body"));
    }

    #[test]
    fn missing_manifest_entry() {
        let entries = vec![FileEntry::new("README.md", "hi")];
        let err = parse_manifest(&entries).unwrap_err();
        assert!(matches!(err, ManifestError::Missing));
    }

    #[test]
    fn nested_manifest_is_not_the_root_manifest() {
        let entries = vec![FileEntry::new(
            "scripts/SKILL.md",
            "---\nname: x\ndescription: y\n---\n",
        )];
        assert!(matches!(
            parse_manifest(&entries).unwrap_err(),
            ManifestError::Missing
        ));
    }
}
