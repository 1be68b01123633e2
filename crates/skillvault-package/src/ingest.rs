//! Upload pipeline: archive bytes to a validated [`SkillPackage`].

use crate::archive::{ArchiveLimits, extract_archive, strip_root_prefix};
use crate::error::{PackageError, ValidationError};
use crate::manifest::{FileEntry, MANIFEST_FILE, Manifest};
use crate::parser::parse_manifest;
use crate::policy::{DEFAULT_ALLOWED_DIRS, DirectoryPolicy, DirectoryWarning, check_directories};
use crate::validator::validate_manifest;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub limits: ArchiveLimits,
    pub allowed_dirs: Vec<String>,
    pub directory_policy: DirectoryPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            limits: ArchiveLimits::default(),
            allowed_dirs: DEFAULT_ALLOWED_DIRS.iter().map(|d| (*d).to_owned()).collect(),
            directory_policy: DirectoryPolicy::default(),
        }
    }
}

/// A normalized, validated skill package.
#[derive(Debug, Clone)]
pub struct SkillPackage {
    pub manifest: Manifest,
    /// All package files relative to the root, `SKILL.md` included.
    pub files: Vec<FileEntry>,
    /// Single top-level directory stripped from the archive, if any.
    pub root_dir: Option<String>,
    /// Directory warnings, only populated under [`DirectoryPolicy::Warn`].
    pub warnings: Vec<DirectoryWarning>,
}

/// Run the full ingestion pipeline over uploaded archive bytes.
///
/// Extraction, root stripping, manifest parsing and validation, name/root
/// consistency and the directory policy run in that order; the first failing
/// stage aborts ingestion.
///
/// # Errors
///
/// Returns the [`PackageError`] of the first stage that fails.
pub fn ingest_package(bytes: &[u8], options: &IngestOptions) -> Result<SkillPackage, PackageError> {
    let mut files = extract_archive(bytes, &options.limits)?;
    let root_dir = strip_root_prefix(&mut files);
    tracing::debug!(root = ?root_dir, files = files.len(), "resolved package root");

    let fields = parse_manifest(&files)?;
    let manifest = validate_manifest(&fields)?;

    let nested: Vec<String> = files
        .iter()
        .filter(|f| f.path.ends_with(&format!("/{MANIFEST_FILE}")))
        .map(|f| format!("{MANIFEST_FILE} is only allowed at the package root (found {})", f.path))
        .collect();
    if !nested.is_empty() {
        return Err(ValidationError { violations: nested }.into());
    }

    if let Some(dir) = &root_dir
        && *dir != manifest.name
    {
        return Err(PackageError::NameMismatch {
            directory: dir.clone(),
            name: manifest.name,
        });
    }

    let warnings = check_directories(
        files.iter().filter(|f| !f.is_manifest()).map(|f| f.path.as_str()),
        &options.allowed_dirs,
    );
    let warnings = match (options.directory_policy, warnings.first()) {
        (DirectoryPolicy::Reject, Some(first)) => {
            return Err(PackageError::DirectoryPolicy {
                directory: first.directory.clone(),
                allowed: options.allowed_dirs.join(", "),
            });
        }
        (DirectoryPolicy::Warn, _) => {
            for w in &warnings {
                tracing::warn!(skill = %manifest.name, "{w}");
            }
            warnings
        }
        (DirectoryPolicy::Reject, None) => Vec::new(),
    };

    tracing::debug!(skill = %manifest.name, files = files.len(), "package ingested");
    Ok(SkillPackage {
        manifest,
        files,
        root_dir,
        warnings,
    })
}
