//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Validate skill packages and manage their version history.
#[derive(Parser, Debug)]
#[command(name = "skillvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (falls back to `SKILLVAULT_CONFIG`, then `config/default.toml`)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Identity recorded as the editor of changes
    #[arg(long, global = true, env = "SKILLVAULT_ACTOR", default_value = "local")]
    pub actor: String,

    /// Act with admin rights, bypassing the ownership check
    #[arg(long, global = true)]
    pub admin: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion pipeline over an archive without storing it.
    Validate {
        /// Path to the zip archive
        archive: PathBuf,

        /// Report non-standard directories as warnings instead of failing
        #[arg(long)]
        warn_dirs: bool,
    },

    /// Ingest an archive and store it as a new skill.
    Import {
        /// Path to the zip archive
        archive: PathBuf,
    },

    /// List stored skills.
    List,

    /// Show the current state of a skill.
    Show {
        /// Skill id or name
        skill: String,
    },

    /// Edit a skill, recording the previous state as a new version.
    ///
    /// # Examples
    ///
    /// ```bash
    /// skillvault edit git --description "Git helpers" -m "reword"
    /// skillvault edit git --file scripts/run.sh=./run.sh --remove-file scripts/old.sh
    /// skillvault edit git --spec ./SKILL.md --tags vcs,cli
    /// ```
    Edit {
        /// Skill id or name
        skill: String,

        /// New skill name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Replace the manifest with the one parsed from this `SKILL.md`
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Add or replace a package file, as `PACKAGE_PATH=LOCAL_PATH`
        #[arg(long = "file", num_args = 1)]
        files: Vec<String>,

        /// Remove a package file by its package path
        #[arg(long = "remove-file", num_args = 1)]
        remove_files: Vec<String>,

        /// Replace the tag set (comma-separated ids or names)
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Edit message stored with the snapshot
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Release a skill, freezing its history.
    Release {
        /// Skill id or name
        skill: String,
    },

    /// List the versions of a skill, newest first.
    History {
        /// Skill id or name
        skill: String,

        #[arg(long)]
        page: Option<i64>,

        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Show a stored version snapshot.
    Version {
        /// Skill id or name
        skill: String,

        /// Version number
        version: String,
    },

    /// Compare two versions path by path.
    Diff {
        /// Skill id or name
        skill: String,

        a: i64,

        b: i64,
    },

    /// Export a skill as a zip archive or a `SKILL.md` document.
    Export {
        /// Skill id or name
        skill: String,

        /// Output file (defaults to `<name>.zip` or stdout for `--manifest`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export only the rendered `SKILL.md`
        #[arg(long)]
        manifest: bool,
    },
}
