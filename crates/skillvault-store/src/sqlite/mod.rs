mod skills;
mod tags;
mod versions;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::StoreError;

pub const DEFAULT_MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    /// Upper bound on tags attached to a single skill.
    pub max_tags: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            max_tags: DEFAULT_MAX_TAGS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_tags: usize,
}

impl SqliteStore {
    /// Open (or create) the `SQLite` database with default options and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        Self::with_options(path, StoreOptions::default()).await
    }

    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// Enables foreign keys so that deleting a skill cascades to its
    /// versions, owners and tag links.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn with_options(path: &str, options: StoreOptions) -> Result<Self, StoreError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(options.busy_timeout)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;
        tracing::debug!(path, "skill store opened");

        Ok(Self {
            pool,
            max_tags: options.max_tags,
        })
    }

    /// Expose the underlying pool for shared access.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Deserialize a nullable JSON column.
fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, StoreError> {
    raw.map(serde_json::from_str).transpose().map_err(StoreError::from)
}

async fn skill_exists(conn: &mut SqliteConnection, skill_id: i64) -> Result<bool, StoreError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM skills WHERE id = ?")
        .bind(skill_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}
