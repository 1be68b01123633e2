//! Upload, edit, history and export operations over the skill store.
//!
//! Each operation returns a [`ServiceError`] whose `code()` is stable and
//! whose `detail()` is meant to be shown to the user as-is.

use std::collections::HashSet;

use skillvault_package::archive::normalize_entry_path;
use skillvault_package::export::{export_archive, render_manifest};
use skillvault_package::validator::revalidate;
use skillvault_package::{
    FileEntry, IngestOptions, MANIFEST_FILE, Manifest, SkillPackage, ValidationError,
    ingest_package,
};
use skillvault_store::{
    NewSkill, PathAlignedDiff, Skill, SkillChanges, SkillSummary, SkillVersion, SqliteStore,
    VersionPage,
};

use crate::config::{Config, HistoryConfig};
use crate::error::ServiceError;

/// Highest page number the history listing accepts.
pub const MAX_HISTORY_PAGE: i64 = 100;

/// The authenticated caller of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    fn can_modify(&self, skill: &Skill) -> bool {
        self.is_admin || skill.is_owned_by(&self.id)
    }
}

/// Fields of an edit. Absent fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub spec: Option<Manifest>,
    pub files: Option<Vec<FileEntry>>,
    pub tags: Option<Vec<String>>,
    pub edit_message: Option<String>,
}

impl EditRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.spec.is_none()
            && self.files.is_none()
            && self.tags.is_none()
    }
}

pub struct SkillService {
    store: SqliteStore,
    ingest: IngestOptions,
    history: HistoryConfig,
}

impl SkillService {
    #[must_use]
    pub fn new(store: SqliteStore, config: &Config) -> Self {
        Self {
            store,
            ingest: config.ingest_options(),
            history: config.history.clone(),
        }
    }

    /// Open the configured database and build a service over it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Internal`] if the database directory cannot be
    /// created or the store fails to open.
    pub async fn open(config: &Config) -> Result<Self, ServiceError> {
        let path = config.storage.sqlite_path.as_str();
        if path != ":memory:"
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Internal(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let store = SqliteStore::with_options(path, config.store_options()).await?;
        Ok(Self::new(store, config))
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Ingest an uploaded archive without persisting it.
    ///
    /// Non-standard directories fail here unless the configured policy is
    /// `warn`.
    ///
    /// # Errors
    ///
    /// Returns the first failing ingestion stage as a [`ServiceError`].
    pub fn upload(&self, bytes: &[u8]) -> Result<SkillPackage, ServiceError> {
        ingest_package(bytes, &self.ingest).map_err(|e| {
            tracing::debug!(code = e.code(), "upload rejected: {e}");
            ServiceError::from(e)
        })
    }

    /// Ingest an archive and store it as a new skill at version 1.
    ///
    /// # Errors
    ///
    /// Returns an ingestion error, or `conflict` if the name is taken.
    pub async fn create_from_upload(
        &self,
        bytes: &[u8],
        owner: &str,
    ) -> Result<Skill, ServiceError> {
        let package = self.upload(bytes)?;
        let skill = self
            .store
            .create_skill(NewSkill {
                manifest: package.manifest,
                files: Some(package.files),
                owners: vec![owner.to_owned()],
                tags: Vec::new(),
            })
            .await?;
        Ok(skill)
    }

    /// # Errors
    ///
    /// Returns `not_found` if the skill does not exist.
    pub async fn get(&self, skill_id: i64) -> Result<Skill, ServiceError> {
        self.store
            .get_skill(skill_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("skill {skill_id}")))
    }

    /// # Errors
    ///
    /// Returns `not_found` if no skill has this name.
    pub async fn get_by_name(&self, name: &str) -> Result<Skill, ServiceError> {
        self.store
            .get_skill_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("skill '{name}'")))
    }

    /// # Errors
    ///
    /// Returns `internal` if the store query fails.
    pub async fn list(&self) -> Result<Vec<SkillSummary>, ServiceError> {
        Ok(self.store.list_skills().await?)
    }

    /// Validate and apply an edit on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// - `not_found` if the skill does not exist.
    /// - `forbidden` if `actor` is neither an owner nor an admin.
    /// - `immutable` if the skill has been released.
    /// - `validation` if the edited manifest or file paths are invalid.
    /// - `conflict` on a name collision or a concurrent version write.
    pub async fn edit(
        &self,
        skill_id: i64,
        actor: &Actor,
        request: EditRequest,
    ) -> Result<Skill, ServiceError> {
        let skill = self.get(skill_id).await?;
        if !actor.can_modify(&skill) {
            return Err(ServiceError::Forbidden {
                actor: actor.id.clone(),
                skill_id,
            });
        }
        if !skill.status.is_editable() {
            return Err(ServiceError::Immutable { skill_id });
        }
        if request.is_empty() {
            return Err(ValidationError::single("edit contains no changes").into());
        }

        validate_edit(&skill, &request)?;

        let changes = SkillChanges {
            name: request.name,
            description: request.description,
            spec: request.spec,
            files: request.files,
            tags: request.tags,
        };
        let updated = self
            .store
            .apply_edit(skill_id, &actor.id, changes, request.edit_message.as_deref())
            .await?;
        Ok(updated)
    }

    /// Freeze a skill's history. Only owners and admins may release.
    ///
    /// # Errors
    ///
    /// Returns `not_found` or `forbidden`.
    pub async fn release(&self, skill_id: i64, actor: &Actor) -> Result<Skill, ServiceError> {
        let skill = self.get(skill_id).await?;
        if !actor.can_modify(&skill) {
            return Err(ServiceError::Forbidden {
                actor: actor.id.clone(),
                skill_id,
            });
        }
        Ok(self.store.release_skill(skill_id).await?)
    }

    /// One page of version summaries, newest first.
    ///
    /// `page` is clamped to `1..=100` and `page_size` to
    /// `1..=max_page_size`; absent values use the first page and the
    /// configured default size.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the skill does not exist.
    pub async fn history(
        &self,
        skill_id: i64,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<VersionPage, ServiceError> {
        let (page, page_size) = self.clamp_page(page, page_size);
        Ok(self.store.list_versions(skill_id, page, page_size).await?)
    }

    fn clamp_page(&self, page: Option<i64>, page_size: Option<i64>) -> (u32, u32) {
        let max_size = i64::from(self.history.max_page_size.max(1));
        let page = page.unwrap_or(1).clamp(1, MAX_HISTORY_PAGE);
        let size = page_size
            .unwrap_or_else(|| i64::from(self.history.default_page_size))
            .clamp(1, max_size);
        (
            u32::try_from(page).unwrap_or(u32::MAX),
            u32::try_from(size).unwrap_or(u32::MAX),
        )
    }

    /// Full snapshot for a version given as user input.
    ///
    /// # Errors
    ///
    /// Returns `not_found` for non-numeric, non-positive or unknown versions.
    pub async fn version_detail(
        &self,
        skill_id: i64,
        raw_version: &str,
    ) -> Result<SkillVersion, ServiceError> {
        let not_found =
            || ServiceError::NotFound(format!("version '{raw_version}' of skill {skill_id}"));
        let version = raw_version
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(not_found)?;
        self.store
            .get_version(skill_id, version)
            .await?
            .ok_or_else(not_found)
    }

    /// # Errors
    ///
    /// Returns `not_found` if the skill or either version is missing.
    pub async fn diff(
        &self,
        skill_id: i64,
        a: i64,
        b: i64,
    ) -> Result<PathAlignedDiff, ServiceError> {
        Ok(self.store.diff_versions(skill_id, a, b).await?)
    }

    /// Render the current manifest as a `SKILL.md` document.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the skill does not exist.
    pub async fn export_manifest(&self, skill_id: i64) -> Result<String, ServiceError> {
        let skill = self.get(skill_id).await?;
        Ok(render_manifest(&skill.spec)?)
    }

    /// Zip the current skill as `<name>/SKILL.md` plus its files.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the skill does not exist.
    pub async fn export_archive(&self, skill_id: i64) -> Result<Vec<u8>, ServiceError> {
        let skill = self.get(skill_id).await?;
        let files = skill.files.unwrap_or_default();
        let bytes = export_archive(&skill.spec, &files)?;
        tracing::debug!(skill_id, bytes = bytes.len(), "skill exported");
        Ok(bytes)
    }
}

fn validate_edit(skill: &Skill, request: &EditRequest) -> Result<(), ValidationError> {
    let mut candidate = request.spec.clone().unwrap_or_else(|| skill.spec.clone());
    if let Some(name) = &request.name {
        candidate.name.clone_from(name);
    }
    if let Some(description) = &request.description {
        candidate.description.clone_from(description);
    }

    let mut violations = match revalidate(&candidate) {
        Ok(()) => Vec::new(),
        Err(err) => err.violations,
    };

    if let Some(files) = &request.files {
        let mut seen = HashSet::new();
        for file in files {
            match normalize_entry_path(&file.path) {
                Ok(Some(normalized)) if normalized == file.path => {}
                _ => violations.push(format!("files: invalid path '{}'", file.path)),
            }
            if file.path.ends_with(&format!("/{MANIFEST_FILE}")) {
                violations.push(format!(
                    "files: '{}' may only appear at the package root",
                    file.path
                ));
            }
            if !seen.insert(file.path.as_str()) {
                violations.push(format!("files: duplicate path '{}'", file.path));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}
