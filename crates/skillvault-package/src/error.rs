#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{what} is {actual} bytes, exceeding the {limit} byte limit")]
    SizeLimit {
        what: &'static str,
        actual: u64,
        limit: u64,
    },

    #[error("archive has {count} entries, exceeding the {limit} entry limit")]
    TooManyEntries { count: usize, limit: usize },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("archive contains no files")]
    Empty,

    #[error("unsafe path in archive: {path}")]
    UnsafePath { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("SKILL.md not found in package root")]
    Missing,

    #[error("SKILL.md must start with a '---' frontmatter block closed by '---'")]
    NoFrontmatterDelimiters,

    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(String),

    #[error("frontmatter must be a key/value mapping")]
    NotAMapping,
}

/// All field-level violations found in a manifest, reported together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    #[must_use]
    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("invalid manifest: {0}")]
    Validation(#[from] ValidationError),

    #[error("directory name '{directory}' does not match skill name '{name}'")]
    NameMismatch { directory: String, name: String },

    #[error("non-standard directory '{directory}' (allowed: {allowed})")]
    DirectoryPolicy { directory: String, allowed: String },

    #[error("failed to write archive: {0}")]
    Export(String),
}

impl PackageError {
    /// Short machine-readable category for the failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Archive(ArchiveError::SizeLimit { .. } | ArchiveError::TooManyEntries { .. }) => {
                "size_limit"
            }
            Self::Archive(ArchiveError::Empty) => "empty_archive",
            Self::Archive(_) => "invalid_archive",
            Self::Manifest(ManifestError::Missing) => "missing_manifest",
            Self::Manifest(_) => "invalid_manifest",
            Self::Validation(_) => "validation",
            Self::NameMismatch { .. } => "name_mismatch",
            Self::DirectoryPolicy { .. } => "directory_policy",
            Self::Export(_) => "export",
        }
    }
}
