use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skillvault_package::{FileEntry, Manifest};

/// Lifecycle of a skill. `Released` freezes the edit history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    #[default]
    Template,
    Released,
}

impl SkillStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Released => "released",
        }
    }

    #[must_use]
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Template)
    }
}

impl fmt::Display for SkillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(Self::Template),
            "released" => Ok(Self::Released),
            other => Err(format!("unknown skill status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub is_system: bool,
}

/// Live, mutable skill record.
#[derive(Debug, Clone, Serialize)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: SkillStatus,
    /// Current version; snapshots `1..version` exist in the history.
    pub version: i64,
    pub spec: Manifest,
    pub files: Option<Vec<FileEntry>>,
    pub owners: Vec<String>,
    pub tags: Vec<Tag>,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Skill {
    #[must_use]
    pub fn is_owned_by(&self, actor_id: &str) -> bool {
        self.owners.iter().any(|o| o == actor_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillSummary {
    pub id: i64,
    pub name: String,
    pub status: SkillStatus,
    pub version: i64,
    pub updated_at: String,
}

/// Input for creating a skill at version 1.
#[derive(Debug, Clone)]
pub struct NewSkill {
    pub manifest: Manifest,
    pub files: Option<Vec<FileEntry>>,
    pub owners: Vec<String>,
    pub tags: Vec<String>,
}

/// Fields of an edit; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SkillChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub spec: Option<Manifest>,
    pub files: Option<Vec<FileEntry>>,
    /// Tag ids or names; replaces the whole tag set when present.
    pub tags: Option<Vec<String>>,
}

/// Immutable snapshot of a skill taken right before an edit.
#[derive(Debug, Clone, Serialize)]
pub struct SkillVersion {
    pub skill_id: i64,
    pub version: i64,
    pub spec: Manifest,
    pub files: Option<Vec<FileEntry>>,
    pub content_hash: String,
    pub edited_by: String,
    pub message: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillVersionSummary {
    pub version: i64,
    pub edited_by: String,
    pub message: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionPage {
    pub items: Vec<SkillVersionSummary>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [SkillStatus::Template, SkillStatus::Released] {
            assert_eq!(status.as_str().parse::<SkillStatus>().unwrap(), status);
        }
        assert!("archived".parse::<SkillStatus>().is_err());
        assert!(SkillStatus::Template.is_editable());
        assert!(!SkillStatus::Released.is_editable());
    }

    #[test]
    fn status_serde() {
        let json = serde_json::to_string(&SkillStatus::Released).unwrap();
        assert_eq!(json, "\"released\"");
    }
}
