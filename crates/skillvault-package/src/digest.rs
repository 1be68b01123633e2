use crate::manifest::{FileEntry, Manifest};

/// Compute a blake3 digest over a manifest and its files.
///
/// The manifest contributes its canonical JSON encoding; files contribute
/// path and content in the given order.
///
/// # Errors
///
/// Returns an error if the manifest cannot be serialized.
pub fn package_digest(manifest: &Manifest, files: Option<&[FileEntry]>) -> serde_json::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(manifest)?);
    for file in files.unwrap_or_default() {
        hasher.update(b"\0");
        hasher.update(file.path.as_bytes());
        hasher.update(b"\0");
        hasher.update(file.content.as_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}
