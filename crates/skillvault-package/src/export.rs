//! Re-serialization of a manifest back into `SKILL.md` and zip form.

use std::io::{Cursor, Write};

use crate::error::PackageError;
use crate::manifest::{FileEntry, MANIFEST_FILE, Manifest};

/// Render a manifest as a `SKILL.md` document.
///
/// All fields except `body` become YAML frontmatter between `---` fences;
/// the body follows the closing fence verbatim.
///
/// # Errors
///
/// Returns [`PackageError::Export`] if the frontmatter cannot be serialized.
pub fn render_manifest(manifest: &Manifest) -> Result<String, PackageError> {
    let frontmatter = Manifest {
        body: None,
        ..manifest.clone()
    };
    let yaml = serde_yaml::to_string(&frontmatter).map_err(|e| PackageError::Export(e.to_string()))?;

    let mut out = String::with_capacity(yaml.len() + 8);
    out.push_str("---\n");
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    if let Some(body) = &manifest.body {
        out.push_str(body);
    }
    Ok(out)
}

/// Build a zip archive with `<name>/SKILL.md` and every other package file.
///
/// Any stored `SKILL.md` entry is replaced by a freshly rendered manifest.
///
/// # Errors
///
/// Returns [`PackageError::Export`] if the archive cannot be written.
pub fn export_archive(manifest: &Manifest, files: &[FileEntry]) -> Result<Vec<u8>, PackageError> {
    let export_err = |e: &dyn std::fmt::Display| PackageError::Export(e.to_string());
    let root = &manifest.name;
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    writer
        .start_file(format!("{root}/{MANIFEST_FILE}"), options)
        .map_err(|e| export_err(&e))?;
    writer
        .write_all(render_manifest(manifest)?.as_bytes())
        .map_err(|e| export_err(&e))?;

    for file in files.iter().filter(|f| !f.is_manifest()) {
        writer
            .start_file(format!("{root}/{}", file.path), options)
            .map_err(|e| export_err(&e))?;
        writer
            .write_all(file.content.as_bytes())
            .map_err(|e| export_err(&e))?;
    }

    let cursor = writer.finish().map_err(|e| export_err(&e))?;
    Ok(cursor.into_inner())
}
