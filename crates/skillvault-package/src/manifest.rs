use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved file name of the manifest at the package root.
pub const MANIFEST_FILE: &str = "SKILL.md";

pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_DESCRIPTION_CHARS: usize = 1024;
pub const MAX_COMPATIBILITY_CHARS: usize = 500;
/// Upper bound on the canonical JSON encoding of a manifest.
pub const MAX_MANIFEST_BYTES: usize = 512 * 1024;

/// A single file of a skill package, path relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

impl FileEntry {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn is_manifest(&self) -> bool {
        self.path == MANIFEST_FILE
    }
}

/// Field that accepts either a scalar string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// Character count used for length limits; list items are measured joined by `", "`.
    #[must_use]
    pub fn char_len(&self) -> usize {
        match self {
            Self::One(s) => s.chars().count(),
            Self::Many(items) => {
                let sep = items.len().saturating_sub(1) * 2;
                items.iter().map(|s| s.chars().count()).sum::<usize>() + sep
            }
        }
    }
}

impl fmt::Display for StringOrList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(s) => f.write_str(s),
            Self::Many(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Validated skill manifest: fixed known fields plus a free-form string map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(
        rename = "allowed-tools",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_tools: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Manifest {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            license: None,
            compatibility: None,
            metadata: None,
            allowed_tools: None,
            body: None,
        }
    }

    /// Size in bytes of the canonical JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialized_len(&self) -> serde_json::Result<usize> {
        serde_json::to_vec(self).map(|v| v.len())
    }
}

/// Frontmatter keys accepted by the manifest schema (`body` comes from the file body).
pub const KNOWN_FIELDS: [&str; 7] = [
    "name",
    "description",
    "license",
    "compatibility",
    "metadata",
    "allowed-tools",
    "body",
];
