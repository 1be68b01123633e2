//! Path-aligned comparison of two skill versions.

use std::collections::BTreeMap;

use serde::Serialize;
use skillvault_package::export::render_manifest;
use skillvault_package::{FileEntry, MANIFEST_FILE, Manifest};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One path with its content on each side; `None` means absent on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    pub a: Option<String>,
    pub b: Option<String>,
}

impl DiffEntry {
    #[must_use]
    pub fn status(&self) -> DiffStatus {
        match (&self.a, &self.b) {
            (None, Some(_)) => DiffStatus::Added,
            (Some(_), None) => DiffStatus::Removed,
            (Some(a), Some(b)) if a == b => DiffStatus::Unchanged,
            _ => DiffStatus::Modified,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathAlignedDiff {
    pub skill_id: i64,
    pub version_a: i64,
    pub version_b: i64,
    /// Both sides carry the same content hash.
    pub identical: bool,
    /// Union of both sides' paths, sorted.
    pub entries: Vec<DiffEntry>,
}

impl PathAlignedDiff {
    /// Entries whose content differs between the two sides.
    pub fn changed(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries
            .iter()
            .filter(|e| e.status() != DiffStatus::Unchanged)
    }
}

/// A version resolved to its spec, files and hash.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSide {
    pub version: i64,
    pub spec: Manifest,
    pub files: Option<Vec<FileEntry>>,
    pub content_hash: String,
}

impl ResolvedSide {
    /// File map of this side. A side without a stored `SKILL.md` contributes
    /// one rendered from its spec so manifest edits stay visible.
    fn file_map(self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut map: BTreeMap<String, String> = self
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|f| (f.path, f.content))
            .collect();
        if !map.contains_key(MANIFEST_FILE) {
            let rendered = render_manifest(&self.spec).map_err(|e| StoreError::Other(e.to_string()))?;
            map.insert(MANIFEST_FILE.to_owned(), rendered);
        }
        Ok(map)
    }
}

pub(crate) fn align(
    skill_id: i64,
    a: ResolvedSide,
    b: ResolvedSide,
) -> Result<PathAlignedDiff, StoreError> {
    let (version_a, version_b) = (a.version, b.version);
    let identical = a.content_hash == b.content_hash;

    let mut left = a.file_map()?;
    let right = b.file_map()?;

    let mut entries = Vec::with_capacity(left.len().max(right.len()));
    for (path, content_b) in right {
        let content_a = left.remove(&path);
        entries.push(DiffEntry {
            path,
            a: content_a,
            b: Some(content_b),
        });
    }
    entries.extend(left.into_iter().map(|(path, content)| DiffEntry {
        path,
        a: Some(content),
        b: None,
    }));
    entries.sort_by(|x, y| x.path.cmp(&y.path));

    Ok(PathAlignedDiff {
        skill_id,
        version_a,
        version_b,
        identical,
        entries,
    })
}
