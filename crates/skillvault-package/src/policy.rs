use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Standard top-level resource directories of a skill package.
pub const DEFAULT_ALLOWED_DIRS: [&str; 3] = ["scripts", "references", "assets"];

/// How non-standard top-level directories are treated during ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryPolicy {
    /// Report warnings on the package and accept it.
    Warn,
    /// Fail ingestion on the first offending directory.
    #[default]
    Reject,
}

/// A non-standard top-level directory found in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryWarning {
    pub directory: String,
    /// First path seen under the directory.
    pub example_path: String,
}

impl std::fmt::Display for DirectoryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "non-standard directory '{}' (e.g. {})",
            self.directory, self.example_path
        )
    }
}

/// Flag top-level directories that are not in `allowed`.
///
/// Emits one warning per distinct offending directory, in order of first
/// appearance. Files at the package root are always accepted.
#[must_use]
pub fn check_directories<'a, I, S>(paths: I, allowed: &[S]) -> Vec<DirectoryWarning>
where
    I: IntoIterator<Item = &'a str>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for path in paths {
        let Some((top, _)) = path.split_once('/') else {
            continue;
        };
        if allowed.iter().any(|a| a.as_ref() == top) {
            continue;
        }
        if seen.insert(top.to_owned()) {
            warnings.push(DirectoryWarning {
                directory: top.to_owned(),
                example_path: path.to_owned(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_has_no_warnings() {
        let paths = ["README.md", "scripts/run.sh", "references/doc.md", "assets/logo.png"];
        assert!(check_directories(paths, &DEFAULT_ALLOWED_DIRS).is_empty());
    }

    #[test]
    fn one_warning_per_directory_in_first_seen_order() {
        let paths = [
            "baddir/a.txt",
            "scripts/ok.sh",
            "other/x",
            "baddir/b.txt",
            "other/y/z",
        ];
        let warnings = check_directories(paths, &DEFAULT_ALLOWED_DIRS);
        let dirs: Vec<_> = warnings.iter().map(|w| w.directory.as_str()).collect();
        assert_eq!(dirs, ["baddir", "other"]);
        assert_eq!(warnings[0].example_path, "baddir/a.txt");
        assert!(warnings[0].to_string().contains("baddir"));
    }

    #[test]
    fn custom_allow_list() {
        let allowed = vec!["docs".to_owned()];
        let warnings = check_directories(["docs/a.md", "scripts/b.sh"], &allowed);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].directory, "scripts");
    }

    #[test]
    fn policy_serde() {
        let p: DirectoryPolicy = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(p, DirectoryPolicy::Warn);
        assert_eq!(DirectoryPolicy::default(), DirectoryPolicy::Reject);
    }
}
