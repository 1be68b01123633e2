mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use skillvault_package::IngestOptions;
use skillvault_package::archive::ArchiveLimits;
use skillvault_store::StoreOptions;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first out-of-range setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.sqlite_path.trim().is_empty() {
            bail!("storage.sqlite_path must not be empty");
        }
        if self.storage.max_connections == 0 {
            bail!("storage.max_connections must be at least 1");
        }
        if self.package.max_archive_bytes == 0 || self.package.max_extracted_bytes == 0 {
            bail!("package size limits must be greater than zero");
        }
        if self.package.max_entries == 0 {
            bail!("package.max_entries must be at least 1");
        }
        if self.history.max_page_size == 0 {
            bail!("history.max_page_size must be at least 1");
        }
        if self.history.default_page_size == 0
            || self.history.default_page_size > self.history.max_page_size
        {
            bail!(
                "history.default_page_size must be between 1 and {}",
                self.history.max_page_size
            );
        }
        if self.tags.max_tags == 0 {
            bail!("tags.max_tags must be at least 1");
        }
        Ok(())
    }

    #[must_use]
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            limits: ArchiveLimits {
                max_archive_bytes: self.package.max_archive_bytes,
                max_extracted_bytes: self.package.max_extracted_bytes,
                max_entries: self.package.max_entries,
            },
            allowed_dirs: self.package.allowed_dirs.clone(),
            directory_policy: self.package.directory_policy,
        }
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.storage.max_connections,
            busy_timeout: Duration::from_secs(self.storage.busy_timeout_secs),
            max_tags: self.tags.max_tags,
        }
    }
}
