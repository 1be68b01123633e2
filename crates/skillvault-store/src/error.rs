#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("skill {skill_id} has been released and can no longer be edited")]
    Immutable { skill_id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("version {version} of skill {skill_id} was written concurrently")]
    VersionConflict { skill_id: i64, version: i64 },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub(crate) fn skill_not_found(skill_id: i64) -> Self {
        Self::NotFound(format!("skill {skill_id}"))
    }

    /// Map unique-constraint violations to the given conflict error.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, conflict: impl FnOnce() -> Self) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => conflict(),
            _ => Self::Sqlite(err),
        }
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict { .. } | Self::Sqlite(sqlx::Error::PoolTimedOut)
        )
    }
}
