//! SQLite persistence for skills: live records, append-only version history,
//! tags and path-aligned diffs.

pub mod diff;
pub mod error;
pub mod sqlite;
pub mod types;

pub use diff::{DiffEntry, DiffStatus, PathAlignedDiff};
pub use error::StoreError;
pub use sqlite::{DEFAULT_MAX_TAGS, SqliteStore, StoreOptions};
pub use types::{
    NewSkill, Skill, SkillChanges, SkillStatus, SkillSummary, SkillVersion, SkillVersionSummary,
    Tag, VersionPage,
};
