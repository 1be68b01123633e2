//! Zip extraction and root-directory detection for uploaded skill packages.

use std::io::{Cursor, Read};

use crate::error::ArchiveError;
use crate::manifest::FileEntry;

pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Hard ceilings applied while unpacking untrusted archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_archive_bytes: u64,
    pub max_extracted_bytes: u64,
    pub max_entries: usize,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Unpack zip bytes into a flat list of text entries in archive order.
///
/// Directory entries are skipped and file contents are decoded as UTF-8,
/// replacing invalid sequences.
///
/// # Errors
///
/// Returns [`ArchiveError::SizeLimit`] when the input or its decompressed
/// contents exceed `limits`, [`ArchiveError::InvalidArchive`] for malformed
/// zip data, [`ArchiveError::UnsafePath`] for absolute or `..` entry paths,
/// and [`ArchiveError::Empty`] when no file entries remain.
pub fn extract_archive(bytes: &[u8], limits: &ArchiveLimits) -> Result<Vec<FileEntry>, ArchiveError> {
    let size = bytes.len() as u64;
    if size > limits.max_archive_bytes {
        return Err(ArchiveError::SizeLimit {
            what: "archive",
            actual: size,
            limit: limits.max_archive_bytes,
        });
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ArchiveError::InvalidArchive(e.to_string()))?;

    if archive.len() > limits.max_entries {
        return Err(ArchiveError::TooManyEntries {
            count: archive.len(),
            limit: limits.max_entries,
        });
    }

    let mut entries = Vec::with_capacity(archive.len());
    let mut extracted: u64 = 0;

    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .map_err(|e| ArchiveError::InvalidArchive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }

        let raw_name = file.name().to_owned();
        let Some(path) = normalize_entry_path(&raw_name)? else {
            continue;
        };

        let budget = limits.max_extracted_bytes - extracted;
        let mut buf = Vec::new();
        file.take(budget + 1)
            .read_to_end(&mut buf)
            .map_err(|e| ArchiveError::InvalidArchive(format!("{raw_name}: {e}")))?;
        extracted += buf.len() as u64;
        if extracted > limits.max_extracted_bytes {
            return Err(ArchiveError::SizeLimit {
                what: "extracted content",
                actual: extracted,
                limit: limits.max_extracted_bytes,
            });
        }

        let content = match String::from_utf8(buf) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        entries.push(FileEntry { path, content });
    }

    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }

    tracing::debug!(entries = entries.len(), bytes = extracted, "archive extracted");
    Ok(entries)
}

/// Normalize an entry name into a relative `/`-separated path.
///
/// Returns `Ok(None)` when nothing but `.`/empty segments remain.
///
/// # Errors
///
/// Returns [`ArchiveError::UnsafePath`] for absolute paths, drive prefixes or
/// any `..` segment.
pub fn normalize_entry_path(raw: &str) -> Result<Option<String>, ArchiveError> {
    let unified = raw.replace('\\', "/");
    let unsafe_path = || ArchiveError::UnsafePath {
        path: raw.to_owned(),
    };

    if unified.starts_with('/') {
        return Err(unsafe_path());
    }
    let bytes = unified.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(unsafe_path());
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(unsafe_path()),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

/// Strip a single top-level directory shared by every entry.
///
/// The candidate is taken from the first entry; mixed top-level layouts are
/// left untouched. Returns the stripped directory name, if any.
pub fn strip_root_prefix(entries: &mut [FileEntry]) -> Option<String> {
    let first = entries.first()?;
    let (candidate, _) = first.path.split_once('/')?;
    let prefix = format!("{candidate}/");

    if !entries.iter().all(|e| e.path.starts_with(&prefix)) {
        return None;
    }

    let root = candidate.to_owned();
    for entry in entries.iter_mut() {
        entry.path = entry.path[prefix.len()..].to_owned();
    }
    Some(root)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;

    pub(crate) fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (path, content) in files {
            writer.start_file(*path, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn entries(paths: &[&str]) -> Vec<FileEntry> {
        paths.iter().map(|p| FileEntry::new(*p, "")).collect()
    }

    #[test]
    fn extracts_entries_in_order() {
        let bytes = zip_bytes(&[("SKILL.md", "---\n"), ("scripts/run.sh", "echo hi")]);
        let files = extract_archive(&bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "SKILL.md");
        assert_eq!(files[1].content, "echo hi");
    }

    #[test]
    fn skips_directory_entries() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("my-skill/", options).unwrap();
        writer.start_file("my-skill/SKILL.md", options).unwrap();
        writer.write_all(b"x").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let files = extract_archive(&bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "my-skill/SKILL.md");
    }

    #[test]
    fn rejects_oversized_input() {
        let bytes = zip_bytes(&[("SKILL.md", "x")]);
        let limits = ArchiveLimits {
            max_archive_bytes: 8,
            ..ArchiveLimits::default()
        };
        let err = extract_archive(&bytes, &limits).unwrap_err();
        assert!(matches!(err, ArchiveError::SizeLimit { what: "archive", .. }));
    }

    #[test]
    fn rejects_decompressed_overflow() {
        let big = "a".repeat(4096);
        let bytes = zip_bytes(&[("SKILL.md", &big)]);
        let limits = ArchiveLimits {
            max_extracted_bytes: 1024,
            ..ArchiveLimits::default()
        };
        let err = extract_archive(&bytes, &limits).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::SizeLimit {
                what: "extracted content",
                ..
            }
        ));
    }

    #[test]
    fn rejects_too_many_entries() {
        let bytes = zip_bytes(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let limits = ArchiveLimits {
            max_entries: 2,
            ..ArchiveLimits::default()
        };
        let err = extract_archive(&bytes, &limits).unwrap_err();
        assert!(matches!(err, ArchiveError::TooManyEntries { count: 3, .. }));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = extract_archive(b"definitely not a zip", &ArchiveLimits::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidArchive(_)));
    }

    #[test]
    fn empty_archive() {
        let bytes = zip_bytes(&[]);
        let err = extract_archive(&bytes, &ArchiveLimits::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::Empty));
    }

    #[test]
    fn non_utf8_content_is_replaced() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("logo.bin", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&[0x66, 0xff, 0x6f]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let files = extract_archive(&bytes, &ArchiveLimits::default()).unwrap();
        assert_eq!(files[0].content, "f\u{fffd}o");
    }

    #[test]
    fn traversal_paths_rejected() {
        for raw in ["../etc/passwd", "a/../../b", "/abs/file", "C:/win", "..\\evil"] {
            let err = normalize_entry_path(raw).unwrap_err();
            assert!(matches!(err, ArchiveError::UnsafePath { .. }), "{raw}");
        }
    }

    #[test]
    fn traversal_entry_fails_whole_archive() {
        let bytes = zip_bytes(&[("SKILL.md", "x"), ("../escape.txt", "boom")]);
        let err = extract_archive(&bytes, &ArchiveLimits::default()).unwrap_err();
        assert!(err.to_string().contains("../escape.txt"));
    }

    #[test]
    fn normalizes_dot_and_backslash_segments() {
        assert_eq!(
            normalize_entry_path("./my-skill\\scripts//run.sh").unwrap(),
            Some("my-skill/scripts/run.sh".into())
        );
        assert_eq!(normalize_entry_path("./").unwrap(), None);
    }

    #[test]
    fn strips_shared_root() {
        let mut files = entries(&["my-skill/SKILL.md", "my-skill/scripts/a.sh"]);
        let root = strip_root_prefix(&mut files);
        assert_eq!(root.as_deref(), Some("my-skill"));
        assert_eq!(files[0].path, "SKILL.md");
        assert_eq!(files[1].path, "scripts/a.sh");
    }

    #[test]
    fn flat_archive_untouched() {
        let mut files = entries(&["SKILL.md", "scripts/a.sh"]);
        assert!(strip_root_prefix(&mut files).is_none());
        assert_eq!(files[0].path, "SKILL.md");
    }

    #[test]
    fn mixed_top_level_not_stripped() {
        let mut files = entries(&["scripts/a.sh", "scripts/b.sh", "SKILL.md"]);
        assert!(strip_root_prefix(&mut files).is_none());
        assert_eq!(files[0].path, "scripts/a.sh");
    }

    #[test]
    fn prefix_must_match_whole_segment() {
        let mut files = entries(&["skill/SKILL.md", "skill-extra/file.txt"]);
        assert!(strip_root_prefix(&mut files).is_none());
    }
}
