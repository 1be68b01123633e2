//! Subcommand handlers and plain-text rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use similar::{ChangeTag, TextDiff};
use skillvault_core::{Actor, EditRequest, SkillService};
use skillvault_package::parser::parse_manifest_str;
use skillvault_package::validator::validate_manifest;
use skillvault_package::{FileEntry, IngestOptions, Manifest, SkillPackage, ingest_package};
use skillvault_store::{DiffStatus, PathAlignedDiff, Skill, SkillVersion, VersionPage};

use crate::cli::Commands;

/// Raw edit flags as given on the command line.
#[derive(Debug, Default)]
pub struct EditArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub spec: Option<PathBuf>,
    pub files: Vec<String>,
    pub remove_files: Vec<String>,
    pub tags: Option<Vec<String>>,
    pub message: Option<String>,
}

/// Run the ingestion pipeline over a local archive and report the outcome.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or fails ingestion.
pub fn validate(archive: &Path, options: &IngestOptions, json: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(archive)
        .with_context(|| format!("failed to read archive {}", archive.display()))?;
    let package = ingest_package(&bytes, options)
        .map_err(skillvault_core::ServiceError::from)
        .with_context(|| format!("{} is not a valid skill package", archive.display()))?;

    if json {
        let value = serde_json::json!({
            "manifest": package.manifest,
            "root_dir": package.root_dir,
            "files": package.files.iter().map(|f| &f.path).collect::<Vec<_>>(),
            "warnings": package.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render_package(&package));
    }
    Ok(())
}

/// Dispatch a store-backed subcommand.
///
/// # Errors
///
/// Returns the failing service call wrapped with command context.
pub async fn run(
    command: Commands,
    service: &SkillService,
    actor: &Actor,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Validate { .. } => bail!("validate does not use the skill store"),
        Commands::Import { archive } => {
            let bytes = std::fs::read(&archive)
                .with_context(|| format!("failed to read archive {}", archive.display()))?;
            let skill = service
                .create_from_upload(&bytes, &actor.id)
                .await
                .context("import failed")?;
            tracing::info!(skill_id = skill.id, name = %skill.name, "skill imported");
            emit(json, &skill, render_skill)?;
        }
        Commands::List => {
            let skills = service.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&skills)?);
            } else {
                for s in &skills {
                    println!("{:>5}  {:<40} v{:<4} {}", s.id, s.name, s.version, s.status);
                }
            }
        }
        Commands::Show { skill } => {
            let skill = resolve_skill(service, &skill).await?;
            emit(json, &skill, render_skill)?;
        }
        Commands::Edit {
            skill,
            name,
            description,
            spec,
            files,
            remove_files,
            tags,
            message,
        } => {
            let current = resolve_skill(service, &skill).await?;
            let args = EditArgs {
                name,
                description,
                spec,
                files,
                remove_files,
                tags,
                message,
            };
            let request = build_edit_request(&current, args)?;
            let updated = service
                .edit(current.id, actor, request)
                .await
                .with_context(|| format!("failed to edit skill '{}'", current.name))?;
            emit(json, &updated, render_skill)?;
        }
        Commands::Release { skill } => {
            let skill = resolve_skill(service, &skill).await?;
            let released = service.release(skill.id, actor).await?;
            emit(json, &released, render_skill)?;
        }
        Commands::History {
            skill,
            page,
            page_size,
        } => {
            let skill = resolve_skill(service, &skill).await?;
            let history = service.history(skill.id, page, page_size).await?;
            emit(json, &history, render_history)?;
        }
        Commands::Version { skill, version } => {
            let skill = resolve_skill(service, &skill).await?;
            let snapshot = service.version_detail(skill.id, &version).await?;
            emit(json, &snapshot, render_version)?;
        }
        Commands::Diff { skill, a, b } => {
            let skill = resolve_skill(service, &skill).await?;
            let diff = service.diff(skill.id, a, b).await?;
            emit(json, &diff, render_diff)?;
        }
        Commands::Export {
            skill,
            output,
            manifest,
        } => {
            let skill = resolve_skill(service, &skill).await?;
            if manifest {
                let doc = service.export_manifest(skill.id).await?;
                match output {
                    Some(path) => write_output(&path, doc.as_bytes())?,
                    None => print!("{doc}"),
                }
            } else {
                let bytes = service.export_archive(skill.id).await?;
                let path = output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", skill.name)));
                write_output(&path, &bytes)?;
                println!("wrote {} ({} bytes)", path.display(), bytes.len());
            }
        }
    }
    Ok(())
}

fn emit<T: serde::Serialize>(json: bool, value: &T, render: fn(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Look a skill up by numeric id, falling back to its name.
async fn resolve_skill(service: &SkillService, reference: &str) -> anyhow::Result<Skill> {
    if let Ok(id) = reference.parse::<i64>()
        && let Ok(skill) = service.get(id).await
    {
        return Ok(skill);
    }
    Ok(service.get_by_name(reference).await?)
}

/// Turn command-line edit flags into an [`EditRequest`] against `current`.
///
/// `--file` and `--remove-file` patch the current file list; the result is
/// sent only when at least one of them is given.
///
/// # Errors
///
/// Returns an error if a local file cannot be read, a `--file` value is
/// malformed, or the `--spec` document does not parse.
pub fn build_edit_request(current: &Skill, args: EditArgs) -> anyhow::Result<EditRequest> {
    let spec = args.spec.as_deref().map(read_spec).transpose()?;

    let files = if args.files.is_empty() && args.remove_files.is_empty() {
        None
    } else {
        let mut files = current.files.clone().unwrap_or_default();
        files.retain(|f| !args.remove_files.contains(&f.path));
        for raw in &args.files {
            let Some((package_path, local_path)) = raw.split_once('=') else {
                bail!("--file expects PACKAGE_PATH=LOCAL_PATH, got '{raw}'");
            };
            let content = std::fs::read_to_string(local_path)
                .with_context(|| format!("failed to read {local_path}"))?;
            match files.iter_mut().find(|f| f.path == package_path) {
                Some(existing) => existing.content = content,
                None => files.push(FileEntry::new(package_path, content)),
            }
        }
        Some(files)
    };

    Ok(EditRequest {
        name: args.name,
        description: args.description,
        spec,
        files,
        tags: args.tags,
        edit_message: args.message,
    })
}

fn read_spec(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let fields = parse_manifest_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    validate_manifest(&fields).with_context(|| format!("invalid manifest in {}", path.display()))
}

#[must_use]
pub fn render_package(package: &SkillPackage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ok: {} ({} files)", package.manifest.name, package.files.len());
    if let Some(root) = &package.root_dir {
        let _ = writeln!(out, "root: {root}/");
    }
    for file in &package.files {
        let _ = writeln!(out, "  {}", file.path);
    }
    for warning in &package.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

#[must_use]
pub fn render_skill(skill: &Skill) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", skill.name, skill.id);
    let _ = writeln!(out, "  status:  {}", skill.status);
    let _ = writeln!(out, "  version: {}", skill.version);
    let _ = writeln!(out, "  owners:  {}", skill.owners.join(", "));
    if !skill.tags.is_empty() {
        let tags: Vec<&str> = skill.tags.iter().map(|t| t.name.as_str()).collect();
        let _ = writeln!(out, "  tags:    {}", tags.join(", "));
    }
    let _ = writeln!(out, "  updated: {}", skill.updated_at);
    let _ = writeln!(out, "  {}", skill.description);
    if let Some(files) = &skill.files {
        for file in files {
            let _ = writeln!(out, "    {} ({} bytes)", file.path, file.content.len());
        }
    }
    out
}

#[must_use]
pub fn render_history(page: &VersionPage) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "page {} ({} per page, {} versions)",
        page.page, page.page_size, page.total
    );
    for item in &page.items {
        let _ = writeln!(
            out,
            "v{:<4} {}  {}  {}",
            item.version,
            item.created_at,
            item.edited_by,
            item.message.as_deref().unwrap_or("")
        );
    }
    out
}

#[must_use]
pub fn render_version(version: &SkillVersion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} v{}", version.spec.name, version.version);
    let _ = writeln!(out, "  edited by {} at {}", version.edited_by, version.created_at);
    if let Some(message) = &version.message {
        let _ = writeln!(out, "  message: {message}");
    }
    let _ = writeln!(out, "  hash: {}", version.content_hash);
    let _ = writeln!(out, "  {}", version.spec.description);
    for file in version.files.iter().flatten() {
        let _ = writeln!(out, "    {} ({} bytes)", file.path, file.content.len());
    }
    out
}

/// Render changed paths as line diffs. Unchanged paths are omitted.
#[must_use]
pub fn render_diff(diff: &PathAlignedDiff) -> String {
    let mut out = String::new();
    if diff.identical {
        let _ = writeln!(out, "v{} and v{} are identical", diff.version_a, diff.version_b);
        return out;
    }
    for entry in diff.changed() {
        let status = match entry.status() {
            DiffStatus::Added => "added",
            DiffStatus::Removed => "removed",
            DiffStatus::Modified => "modified",
            DiffStatus::Unchanged => continue,
        };
        let _ = writeln!(out, "=== {} ({status})", entry.path);
        let old = entry.a.as_deref().unwrap_or("");
        let new = entry.b.as_deref().unwrap_or("");
        for change in TextDiff::from_lines(old, new).iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            let _ = write!(out, "{sign}{change}");
            if change.missing_newline() {
                out.push('\n');
            }
        }
    }
    out
}
