//! Skill package ingestion: zip extraction, `SKILL.md` parsing, manifest
//! validation, directory policy, and export back to `SKILL.md`/zip.

pub mod archive;
pub mod digest;
pub mod error;
pub mod export;
pub mod ingest;
pub mod manifest;
pub mod parser;
pub mod policy;
pub mod validator;

pub use error::{ArchiveError, ManifestError, PackageError, ValidationError};
pub use ingest::{IngestOptions, SkillPackage, ingest_package};
pub use manifest::{FileEntry, MANIFEST_FILE, Manifest, StringOrList};
pub use policy::DirectoryPolicy;
