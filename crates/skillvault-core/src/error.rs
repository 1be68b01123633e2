use skillvault_package::{ArchiveError, PackageError, ValidationError};
use skillvault_store::StoreError;

/// User-facing failure of a service operation: a stable [`code`](Self::code)
/// plus a human-readable [`detail`](Self::detail).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("invalid edit: {0}")]
    Validation(#[from] ValidationError),

    #[error("skill {skill_id} has been released and can no longer be edited")]
    Immutable { skill_id: i64 },

    #[error("'{actor}' is not an owner of skill {skill_id}")]
    Forbidden { actor: String, skill_id: i64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, retryable: bool },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Package(err) => match err {
                PackageError::Archive(
                    ArchiveError::SizeLimit { .. } | ArchiveError::TooManyEntries { .. },
                ) => "size_limit",
                PackageError::Archive(
                    ArchiveError::Empty
                    | ArchiveError::InvalidArchive(_)
                    | ArchiveError::UnsafePath { .. },
                ) => "invalid_archive",
                PackageError::Manifest(_) | PackageError::Validation(_) => "validation",
                PackageError::NameMismatch { .. } => "name_mismatch",
                PackageError::DirectoryPolicy { .. } => "directory_policy",
                PackageError::Export(_) => "internal",
            },
            Self::Validation(_) => "validation",
            Self::Immutable { .. } => "immutable",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Internal(_) => "internal",
        }
    }

    /// Full message, including every aggregated validation violation.
    #[must_use]
    pub fn detail(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { retryable: true, .. })
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        let retryable = err.is_retryable();
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Immutable { skill_id } => Self::Immutable { skill_id },
            StoreError::Conflict(message) => Self::Conflict {
                message,
                retryable: false,
            },
            conflict @ StoreError::VersionConflict { .. } => Self::Conflict {
                message: conflict.to_string(),
                retryable: true,
            },
            other if retryable => Self::Conflict {
                message: other.to_string(),
                retryable: true,
            },
            other => {
                tracing::error!("store failure: {other}");
                Self::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_codes_collapse_to_service_codes() {
        let cases = [
            (
                PackageError::from(ArchiveError::SizeLimit {
                    what: "archive",
                    actual: 2,
                    limit: 1,
                }),
                "size_limit",
            ),
            (PackageError::from(ArchiveError::Empty), "invalid_archive"),
            (
                PackageError::from(skillvault_package::ManifestError::Missing),
                "validation",
            ),
            (
                PackageError::NameMismatch {
                    directory: "a".into(),
                    name: "b".into(),
                },
                "name_mismatch",
            ),
            (
                PackageError::DirectoryPolicy {
                    directory: "x".into(),
                    allowed: "scripts".into(),
                },
                "directory_policy",
            ),
            (
                PackageError::from(ArchiveError::TooManyEntries {
                    count: 3,
                    limit: 2,
                }),
                "size_limit",
            ),
            (
                PackageError::from(ArchiveError::UnsafePath {
                    path: "../x".into(),
                }),
                "invalid_archive",
            ),
            (
                PackageError::from(skillvault_package::ManifestError::NotAMapping),
                "validation",
            ),
            (PackageError::Export("io".into()), "internal"),
        ];
        for (err, code) in cases {
            assert_eq!(ServiceError::from(err).code(), code);
        }
    }

    #[test]
    fn store_errors_map_by_kind() {
        let immutable = ServiceError::from(StoreError::Immutable { skill_id: 3 });
        assert_eq!(immutable.code(), "immutable");
        assert!(immutable.detail().contains("released"));

        let conflict = ServiceError::from(StoreError::VersionConflict {
            skill_id: 1,
            version: 2,
        });
        assert_eq!(conflict.code(), "conflict");
        assert!(conflict.is_retryable());

        let taken = ServiceError::from(StoreError::Conflict("name taken".into()));
        assert!(!taken.is_retryable());

        let missing = ServiceError::from(StoreError::NotFound("skill 9".into()));
        assert_eq!(missing.code(), "not_found");
        assert_eq!(missing.detail(), "skill 9 not found");

        let other = ServiceError::from(StoreError::Other("boom".into()));
        assert_eq!(other.code(), "internal");
    }

    #[test]
    fn validation_detail_lists_every_violation() {
        let err = ServiceError::from(ValidationError {
            violations: vec!["name: bad".into(), "description: required".into()],
        });
        assert_eq!(err.code(), "validation");
        assert!(err.detail().contains("name: bad; description: required"));
    }
}
