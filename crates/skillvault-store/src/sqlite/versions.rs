use skillvault_package::digest::package_digest;
use skillvault_package::export::render_manifest;
use skillvault_package::{FileEntry, MANIFEST_FILE, Manifest};
use sqlx::SqliteConnection;

use super::skills::{encode_files, fetch_skill};
use super::{SqliteStore, decode_json, skill_exists, tags};
use crate::diff::{PathAlignedDiff, ResolvedSide, align};
use crate::error::StoreError;
use crate::types::{Skill, SkillChanges, SkillVersion, SkillVersionSummary, VersionPage};

type VersionRow = (i64, i64, String, Option<String>, String, String, Option<String>, String);

fn version_from_row(row: VersionRow) -> Result<SkillVersion, StoreError> {
    let (skill_id, version, spec, files, content_hash, edited_by, message, created_at) = row;
    Ok(SkillVersion {
        skill_id,
        version,
        spec: serde_json::from_str(&spec)?,
        files: decode_json(files.as_deref())?,
        content_hash,
        edited_by,
        message,
        created_at,
    })
}

/// Merge the requested changes into the current spec and files.
///
/// `name` and `description` override the corresponding spec fields. When a
/// file list is present its root `SKILL.md` always comes from the resulting
/// spec: the stored one is carried over while the spec is unchanged and
/// re-rendered otherwise. A `SKILL.md` supplied with the files is discarded.
fn merge_changes(
    current: &Skill,
    changes: SkillChanges,
) -> Result<(Manifest, Option<Vec<FileEntry>>), StoreError> {
    let mut spec = changes.spec.unwrap_or_else(|| current.spec.clone());
    if let Some(name) = changes.name {
        spec.name = name;
    }
    if let Some(description) = changes.description {
        spec.description = description;
    }

    let Some(mut files) = changes.files.or_else(|| current.files.clone()) else {
        return Ok((spec, None));
    };

    let stored = current
        .files
        .iter()
        .flatten()
        .find(|f| f.is_manifest())
        .filter(|_| spec == current.spec);
    let manifest_file = match stored {
        Some(file) => file.clone(),
        None => FileEntry::new(
            MANIFEST_FILE,
            render_manifest(&spec).map_err(|e| StoreError::Other(e.to_string()))?,
        ),
    };
    files.retain(|f| !f.is_manifest());
    files.insert(0, manifest_file);
    Ok((spec, Some(files)))
}

impl SqliteStore {
    /// Snapshot the live state of a skill and apply `changes`, advancing its
    /// version by one.
    ///
    /// The whole sequence runs in one transaction whose first statement
    /// writes the skill row, so concurrent editors of the same database
    /// serialize on the writer lock. Any error rolls back both the snapshot
    /// and the update.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the skill does not exist.
    /// - [`StoreError::Immutable`] if the skill has been released.
    /// - [`StoreError::VersionConflict`] if the snapshot version is already taken.
    /// - [`StoreError::Conflict`] if a renamed skill collides with another name.
    pub async fn apply_edit(
        &self,
        skill_id: i64,
        actor_id: &str,
        changes: SkillChanges,
        edit_message: Option<&str>,
    ) -> Result<Skill, StoreError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE skills SET updated_at = updated_at WHERE id = ?")
            .bind(skill_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(StoreError::skill_not_found(skill_id));
        }

        let current = fetch_skill(&mut tx, skill_id)
            .await?
            .ok_or_else(|| StoreError::skill_not_found(skill_id))?;
        if !current.status.is_editable() {
            return Err(StoreError::Immutable { skill_id });
        }

        sqlx::query(
            "INSERT INTO skill_versions \
             (skill_id, version, spec, files, content_hash, edited_by, message) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(skill_id)
        .bind(current.version)
        .bind(serde_json::to_string(&current.spec)?)
        .bind(encode_files(current.files.as_deref())?)
        .bind(&current.content_hash)
        .bind(actor_id)
        .bind(edit_message)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            StoreError::conflict_on_unique(e, || StoreError::VersionConflict {
                skill_id,
                version: current.version,
            })
        })?;

        let tag_idents = changes.tags.clone();
        let (spec, files) = merge_changes(&current, changes)?;
        let content_hash = package_digest(&spec, files.as_deref())?;

        sqlx::query(
            "UPDATE skills SET name = ?, description = ?, spec = ?, files = ?, \
             content_hash = ?, version = version + 1, updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(serde_json::to_string(&spec)?)
        .bind(encode_files(files.as_deref())?)
        .bind(&content_hash)
        .bind(skill_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            StoreError::conflict_on_unique(e, || {
                StoreError::Conflict(format!("skill name '{}' is already taken", spec.name))
            })
        })?;

        if let Some(idents) = tag_idents {
            tags::replace_tags(&mut tx, skill_id, &idents, self.max_tags).await?;
        }

        let updated = fetch_skill(&mut tx, skill_id)
            .await?
            .ok_or_else(|| StoreError::skill_not_found(skill_id))?;
        tx.commit().await?;

        tracing::info!(
            skill_id,
            from = current.version,
            to = updated.version,
            actor = actor_id,
            "skill edited"
        );
        Ok(updated)
    }

    /// List snapshots newest first. `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the skill does not exist.
    pub async fn list_versions(
        &self,
        skill_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<VersionPage, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if !skill_exists(&mut conn, skill_id).await? {
            return Err(StoreError::skill_not_found(skill_id));
        }

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM skill_versions WHERE skill_id = ?")
                .bind(skill_id)
                .fetch_one(&mut *conn)
                .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows: Vec<(i64, String, Option<String>, String)> = sqlx::query_as(
            "SELECT version, edited_by, message, created_at FROM skill_versions \
             WHERE skill_id = ? ORDER BY version DESC LIMIT ? OFFSET ?",
        )
        .bind(skill_id)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let items = rows
            .into_iter()
            .map(|(version, edited_by, message, created_at)| SkillVersionSummary {
                version,
                edited_by,
                message,
                created_at,
            })
            .collect();

        Ok(VersionPage {
            items,
            page,
            page_size,
            total,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the query or JSON decoding fails.
    pub async fn get_version(
        &self,
        skill_id: i64,
        version: i64,
    ) -> Result<Option<SkillVersion>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_version(&mut conn, skill_id, version).await
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_versions(&self, skill_id: i64) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM skill_versions WHERE skill_id = ?")
                .bind(skill_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Compare two versions of a skill path by path.
    ///
    /// The current version number resolves to the live skill; older numbers
    /// resolve to their snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the skill or either version is missing.
    pub async fn diff_versions(
        &self,
        skill_id: i64,
        a: i64,
        b: i64,
    ) -> Result<PathAlignedDiff, StoreError> {
        let mut tx = self.pool.begin().await?;
        let skill = fetch_skill(&mut tx, skill_id)
            .await?
            .ok_or_else(|| StoreError::skill_not_found(skill_id))?;

        let side_a = resolve_side(&mut tx, &skill, a).await?;
        let side_b = resolve_side(&mut tx, &skill, b).await?;
        tx.commit().await?;

        let diff = align(skill_id, side_a, side_b)?;
        tracing::debug!(skill_id, a, b, entries = diff.entries.len(), "versions diffed");
        Ok(diff)
    }
}

async fn fetch_version(
    conn: &mut SqliteConnection,
    skill_id: i64,
    version: i64,
) -> Result<Option<SkillVersion>, StoreError> {
    let row: Option<VersionRow> = sqlx::query_as(
        "SELECT skill_id, version, spec, files, content_hash, edited_by, message, created_at \
         FROM skill_versions WHERE skill_id = ? AND version = ?",
    )
    .bind(skill_id)
    .bind(version)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(version_from_row).transpose()
}

async fn resolve_side(
    conn: &mut SqliteConnection,
    skill: &Skill,
    version: i64,
) -> Result<ResolvedSide, StoreError> {
    if version == skill.version {
        return Ok(ResolvedSide {
            version,
            spec: skill.spec.clone(),
            files: skill.files.clone(),
            content_hash: skill.content_hash.clone(),
        });
    }
    let snapshot = fetch_version(conn, skill.id, version).await?.ok_or_else(|| {
        StoreError::NotFound(format!("version {version} of skill {}", skill.id))
    })?;
    Ok(ResolvedSide {
        version,
        spec: snapshot.spec,
        files: snapshot.files,
        content_hash: snapshot.content_hash,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use super::super::tests::{new_skill, test_store};
    use super::*;
    use crate::diff::DiffStatus;

    fn rename(name: &str) -> SkillChanges {
        SkillChanges {
            name: Some(name.into()),
            ..SkillChanges::default()
        }
    }

    fn describe(text: &str) -> SkillChanges {
        SkillChanges {
            description: Some(text.into()),
            ..SkillChanges::default()
        }
    }

    #[tokio::test]
    async fn edits_advance_version_and_keep_contiguous_snapshots() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();

        for i in 0..3 {
            store
                .apply_edit(skill.id, "alice", describe(&format!("rev {i}")), Some("tweak"))
                .await
                .unwrap();
        }

        let current = store.get_skill(skill.id).await.unwrap().unwrap();
        assert_eq!(current.version, 4);
        assert_eq!(current.description, "rev 2");
        assert_eq!(current.spec.description, "rev 2");
        assert_eq!(store.count_versions(skill.id).await.unwrap(), 3);

        let page = store.list_versions(skill.id, 1, 10).await.unwrap();
        let versions: Vec<i64> = page.items.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn snapshot_holds_pre_edit_state() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        let edited = store
            .apply_edit(skill.id, "bob", describe("after"), Some("first edit"))
            .await
            .unwrap();

        let snapshot = store.get_version(skill.id, 1).await.unwrap().unwrap();
        assert_eq!(snapshot.spec.description, "git helper");
        assert_eq!(snapshot.content_hash, skill.content_hash);
        assert_eq!(snapshot.edited_by, "bob");
        assert_eq!(snapshot.message.as_deref(), Some("first edit"));
        assert_ne!(edited.content_hash, skill.content_hash);
    }

    #[tokio::test]
    async fn spec_edit_rerenders_stored_manifest_file() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        let edited = store
            .apply_edit(skill.id, "alice", describe("Reworded"), None)
            .await
            .unwrap();

        let files = edited.files.unwrap();
        let manifest = files.iter().find(|f| f.path == MANIFEST_FILE).unwrap();
        assert!(manifest.content.contains("description: Reworded"));
        assert_eq!(files.iter().find(|f| f.path == "scripts/run.sh").unwrap().content, "echo v1");
    }

    #[tokio::test]
    async fn failure_after_snapshot_rolls_back() {
        let store = test_store().await;
        store.create_skill(new_skill("taken")).await.unwrap();
        let skill = store.create_skill(new_skill("git")).await.unwrap();

        let err = store
            .apply_edit(skill.id, "alice", rename("taken"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err}");

        let current = store.get_skill(skill.id).await.unwrap().unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(current.name, "git");
        assert_eq!(store.count_versions(skill.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn released_skill_is_immutable() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        store.release_skill(skill.id).await.unwrap();

        let err = store
            .apply_edit(skill.id, "alice", describe("nope"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Immutable { .. }));
        assert!(err.to_string().contains("released"));
        assert_eq!(store.count_versions(skill.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn edit_missing_skill() {
        let store = test_store().await;
        let err = store
            .apply_edit(99, "alice", describe("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn reused_version_surfaces_as_retryable_conflict() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        sqlx::query(
            "INSERT INTO skill_versions (skill_id, version, spec, content_hash, edited_by) \
             VALUES (?, 1, '{}', 'x', 'intruder')",
        )
        .bind(skill.id)
        .execute(store.pool())
        .await
        .unwrap();

        let err = store
            .apply_edit(skill.id, "alice", describe("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { version: 1, .. }), "{err}");
        assert!(err.is_retryable());
        assert_eq!(store.get_skill(skill.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn snapshots_cannot_be_updated() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        store.apply_edit(skill.id, "alice", describe("x"), None).await.unwrap();

        let result = sqlx::query("UPDATE skill_versions SET edited_by = 'mallory' WHERE skill_id = ?")
            .bind(skill.id)
            .execute(store.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tags_replaced_only_when_present() {
        let store = test_store().await;
        let mut new = new_skill("git");
        new.tags = vec!["vcs".into()];
        let skill = store.create_skill(new).await.unwrap();

        let kept = store.apply_edit(skill.id, "alice", describe("x"), None).await.unwrap();
        assert_eq!(kept.tags.len(), 1);

        let changes = SkillChanges {
            tags: Some(vec!["cli".into(), "tools".into()]),
            ..SkillChanges::default()
        };
        let replaced = store.apply_edit(skill.id, "alice", changes, None).await.unwrap();
        let names: Vec<_> = replaced.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["cli", "tools"]);
    }

    #[tokio::test]
    async fn pagination() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        for i in 0..5 {
            store
                .apply_edit(skill.id, "alice", describe(&i.to_string()), None)
                .await
                .unwrap();
        }

        let page2 = store.list_versions(skill.id, 2, 2).await.unwrap();
        let versions: Vec<i64> = page2.items.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![3, 2]);
        assert_eq!(page2.total, 5);

        let beyond = store.list_versions(skill.id, 9, 2).await.unwrap();
        assert!(beyond.items.is_empty());

        let err = store.list_versions(404, 1, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn diff_resolves_live_and_snapshot_sides() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        let changes = SkillChanges {
            files: Some(vec![
                skill.files.clone().unwrap()[0].clone(),
                FileEntry::new("scripts/run.sh", "echo v2"),
                FileEntry::new("references/new.md", "doc"),
            ]),
            ..SkillChanges::default()
        };
        store.apply_edit(skill.id, "alice", changes, None).await.unwrap();

        let diff = store.diff_versions(skill.id, 1, 2).await.unwrap();
        assert!(!diff.identical);
        let summary: Vec<_> = diff.entries.iter().map(|e| (e.path.as_str(), e.status())).collect();
        assert_eq!(
            summary,
            vec![
                ("SKILL.md", DiffStatus::Unchanged),
                ("references/new.md", DiffStatus::Added),
                ("scripts/run.sh", DiffStatus::Modified),
            ]
        );

        let same = store.diff_versions(skill.id, 2, 2).await.unwrap();
        assert!(same.identical);
    }

    #[tokio::test]
    async fn diff_unknown_version_not_found() {
        let store = test_store().await;
        let skill = store.create_skill(new_skill("git")).await.unwrap();
        for i in 0..2 {
            store
                .apply_edit(skill.id, "alice", describe(&i.to_string()), None)
                .await
                .unwrap();
        }
        let err = store.diff_versions(skill.id, 1, 99).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.get_version(skill.id, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readers_never_observe_a_partial_edit() {
        let file = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStore::new(file.path().to_str().unwrap()).await.unwrap());
        let mut new = new_skill("git");
        new.tags = vec!["v1".into()];
        let skill_id = store.create_skill(new).await.unwrap().id;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for next in 2..=60 {
                    let changes = SkillChanges {
                        description: Some(format!("rev {next}")),
                        tags: Some(vec![format!("v{next}")]),
                        ..SkillChanges::default()
                    };
                    store.apply_edit(skill_id, "alice", changes, None).await.unwrap();
                }
            })
        };

        let mut reads = 0;
        while !writer.is_finished() {
            let skill = store.get_skill(skill_id).await.unwrap().unwrap();
            let tags: Vec<_> = skill.tags.iter().map(|t| t.name.clone()).collect();
            assert_eq!(tags, vec![format!("v{}", skill.version)], "read {reads}");
            if skill.version > 1 {
                assert_eq!(skill.description, format!("rev {}", skill.version));
            }

            store.diff_versions(skill_id, 1, skill.version).await.unwrap();
            reads += 1;
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.get_skill(skill_id).await.unwrap().unwrap().version, 60);
    }

    #[tokio::test]
    async fn concurrent_edits_serialize() {
        let file = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStore::new(file.path().to_str().unwrap()).await.unwrap());
        let skill_id = store.create_skill(new_skill("git")).await.unwrap().id;

        let mut handles = Vec::new();
        for worker in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..5 {
                    loop {
                        match store
                            .apply_edit(skill_id, "alice", describe(&format!("{worker}-{i}")), None)
                            .await
                        {
                            Ok(_) => break,
                            Err(e) if e.is_retryable() => {}
                            Err(e) => panic!("edit failed: {e}"),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let current = store.get_skill(skill_id).await.unwrap().unwrap();
        assert_eq!(current.version, 21);
        let page = store.list_versions(skill_id, 1, 100).await.unwrap();
        let versions: Vec<i64> = page.items.iter().map(|v| v.version).collect();
        assert_eq!(versions, (1..=20).rev().collect::<Vec<_>>());
    }
}
