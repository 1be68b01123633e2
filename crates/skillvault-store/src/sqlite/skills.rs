use skillvault_package::digest::package_digest;
use skillvault_package::{FileEntry, Manifest};
use sqlx::SqliteConnection;

use super::{SqliteStore, decode_json, tags};
use crate::error::StoreError;
use crate::types::{NewSkill, Skill, SkillStatus, SkillSummary};

type SkillRow = (
    i64,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    String,
    String,
    String,
);

const SKILL_COLUMNS: &str = "id, name, description, status, version, spec, files, content_hash, \
     created_at, updated_at";

pub(super) fn encode_files(files: Option<&[FileEntry]>) -> Result<Option<String>, StoreError> {
    files.map(serde_json::to_string).transpose().map_err(StoreError::from)
}

/// Load a skill with owners and tags through an existing connection or transaction.
pub(super) async fn fetch_skill(
    conn: &mut SqliteConnection,
    skill_id: i64,
) -> Result<Option<Skill>, StoreError> {
    let sql = format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = ?");
    let row: Option<SkillRow> = sqlx::query_as(&sql)
        .bind(skill_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => hydrate(conn, row).await.map(Some),
        None => Ok(None),
    }
}

async fn hydrate(conn: &mut SqliteConnection, row: SkillRow) -> Result<Skill, StoreError> {
    let (id, name, description, status, version, spec, files, content_hash, created_at, updated_at) =
        row;

    let owners: Vec<(String,)> =
        sqlx::query_as("SELECT owner_id FROM skill_owners WHERE skill_id = ? ORDER BY owner_id")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(Skill {
        id,
        name,
        description,
        status: status.parse::<SkillStatus>().map_err(StoreError::Other)?,
        version,
        spec: serde_json::from_str::<Manifest>(&spec)?,
        files: decode_json(files.as_deref())?,
        owners: owners.into_iter().map(|(o,)| o).collect(),
        tags: tags::load_tags(conn, id).await?,
        content_hash,
        created_at,
        updated_at,
    })
}

impl SqliteStore {
    /// Persist a new skill at version 1 together with its owners and tags.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a skill with the same name exists.
    pub async fn create_skill(&self, new: NewSkill) -> Result<Skill, StoreError> {
        let spec_json = serde_json::to_string(&new.manifest)?;
        let files_json = encode_files(new.files.as_deref())?;
        let content_hash = package_digest(&new.manifest, new.files.as_deref())?;
        let name = new.manifest.name.clone();

        let mut tx = self.pool.begin().await?;

        let (skill_id,): (i64,) = sqlx::query_as(
            "INSERT INTO skills (name, description, status, version, spec, files, content_hash) \
             VALUES (?, ?, 'template', 1, ?, ?, ?) RETURNING id",
        )
        .bind(&name)
        .bind(&new.manifest.description)
        .bind(&spec_json)
        .bind(&files_json)
        .bind(&content_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            StoreError::conflict_on_unique(e, || {
                StoreError::Conflict(format!("skill name '{name}' is already taken"))
            })
        })?;

        for owner in &new.owners {
            sqlx::query("INSERT OR IGNORE INTO skill_owners (skill_id, owner_id) VALUES (?, ?)")
                .bind(skill_id)
                .bind(owner)
                .execute(&mut *tx)
                .await?;
        }

        if !new.tags.is_empty() {
            tags::replace_tags(&mut tx, skill_id, &new.tags, self.max_tags).await?;
        }

        let skill = fetch_skill(&mut tx, skill_id)
            .await?
            .ok_or_else(|| StoreError::skill_not_found(skill_id))?;
        tx.commit().await?;

        tracing::info!(skill_id, name = %skill.name, "skill created");
        Ok(skill)
    }

    /// Load a skill with its owners and tags.
    ///
    /// All rows are read in one transaction, so a concurrent edit is seen
    /// either entirely or not at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or JSON decoding fails.
    pub async fn get_skill(&self, skill_id: i64) -> Result<Option<Skill>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let skill = fetch_skill(&mut tx, skill_id).await?;
        tx.commit().await?;
        Ok(skill)
    }

    /// # Errors
    ///
    /// Returns an error if the query or JSON decoding fails.
    pub async fn get_skill_by_name(&self, name: &str) -> Result<Option<Skill>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {SKILL_COLUMNS} FROM skills WHERE name = ?");
        let row: Option<SkillRow> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let skill = match row {
            Some(row) => Some(hydrate(&mut tx, row).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(skill)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_skills(&self) -> Result<Vec<SkillSummary>, StoreError> {
        let rows: Vec<(i64, String, String, i64, String)> = sqlx::query_as(
            "SELECT id, name, status, version, updated_at FROM skills ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, status, version, updated_at)| -> Result<_, StoreError> {
                Ok(SkillSummary {
                    id,
                    name,
                    status: status.parse().map_err(StoreError::Other)?,
                    version,
                    updated_at,
                })
            })
            .collect()
    }

    /// Mark a skill as released. Released skills reject further edits.
    ///
    /// Releasing an already released skill is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the skill does not exist.
    pub async fn release_skill(&self, skill_id: i64) -> Result<Skill, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE skills SET status = 'released', updated_at = datetime('now') \
             WHERE id = ? AND status = 'template'",
        )
        .bind(skill_id)
        .execute(&mut *tx)
        .await?;

        let skill = fetch_skill(&mut tx, skill_id)
            .await?
            .ok_or_else(|| StoreError::skill_not_found(skill_id))?;
        tx.commit().await?;

        if result.rows_affected() > 0 {
            tracing::info!(skill_id, version = skill.version, "skill released");
        }
        Ok(skill)
    }

    /// Delete a skill and, by cascade, its history, owners and tag links.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete_skill(&self, skill_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM skills WHERE id = ?")
            .bind(skill_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
