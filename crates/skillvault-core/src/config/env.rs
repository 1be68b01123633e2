use skillvault_package::DirectoryPolicy;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_storage();
        self.apply_env_overrides_package();
        self.apply_env_overrides_history();
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Ok(v) = std::env::var("SKILLVAULT_SQLITE_PATH") {
            self.storage.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_MAX_CONNECTIONS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.storage.max_connections = n;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_BUSY_TIMEOUT_SECS")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.storage.busy_timeout_secs = secs;
        }
    }

    fn apply_env_overrides_package(&mut self) {
        if let Ok(v) = std::env::var("SKILLVAULT_MAX_ARCHIVE_BYTES")
            && let Ok(bytes) = v.parse::<u64>()
        {
            self.package.max_archive_bytes = bytes;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_MAX_EXTRACTED_BYTES")
            && let Ok(bytes) = v.parse::<u64>()
        {
            self.package.max_extracted_bytes = bytes;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_MAX_ENTRIES")
            && let Ok(n) = v.parse::<usize>()
        {
            self.package.max_entries = n;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_ALLOWED_DIRS") {
            self.package.allowed_dirs = v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("SKILLVAULT_DIRECTORY_POLICY") {
            if let Ok(policy) =
                serde_json::from_value::<DirectoryPolicy>(serde_json::Value::String(v.clone()))
            {
                self.package.directory_policy = policy;
            } else {
                tracing::warn!("ignoring invalid SKILLVAULT_DIRECTORY_POLICY value: {v}");
            }
        }
    }

    fn apply_env_overrides_history(&mut self) {
        if let Ok(v) = std::env::var("SKILLVAULT_HISTORY_PAGE_SIZE")
            && let Ok(n) = v.parse::<u32>()
        {
            self.history.default_page_size = n;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_HISTORY_MAX_PAGE_SIZE")
            && let Ok(n) = v.parse::<u32>()
        {
            self.history.max_page_size = n;
        }
        if let Ok(v) = std::env::var("SKILLVAULT_MAX_TAGS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.tags.max_tags = n;
        }
    }
}
