use serde::{Deserialize, Serialize};
use skillvault_package::DirectoryPolicy;
use skillvault_package::archive::{
    DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_EXTRACTED_BYTES,
};
use skillvault_package::policy::DEFAULT_ALLOWED_DIRS;
use skillvault_store::DEFAULT_MAX_TAGS;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub tags: TagsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_sqlite_path() -> String {
    "./data/skillvault.db".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageConfig {
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    #[serde(default = "default_max_extracted_bytes")]
    pub max_extracted_bytes: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Top-level directories a package may contain besides `SKILL.md`.
    #[serde(default = "default_allowed_dirs")]
    pub allowed_dirs: Vec<String>,
    #[serde(default)]
    pub directory_policy: DirectoryPolicy,
}

fn default_max_archive_bytes() -> u64 {
    DEFAULT_MAX_ARCHIVE_BYTES
}

fn default_max_extracted_bytes() -> u64 {
    DEFAULT_MAX_EXTRACTED_BYTES
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_allowed_dirs() -> Vec<String> {
    DEFAULT_ALLOWED_DIRS.iter().map(|d| (*d).to_owned()).collect()
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            max_archive_bytes: default_max_archive_bytes(),
            max_extracted_bytes: default_max_extracted_bytes(),
            max_entries: default_max_entries(),
            allowed_dirs: default_allowed_dirs(),
            directory_policy: DirectoryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TagsConfig {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

fn default_max_tags() -> usize {
    DEFAULT_MAX_TAGS
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
        }
    }
}
