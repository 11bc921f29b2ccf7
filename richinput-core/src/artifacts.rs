use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a file artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// Oversized pasted text written to disk instead of inserted inline.
    SpilledText,
    PastedImage,
    PastedPdf,
    /// Generic file contents read off the clipboard.
    PastedFile,
    /// A path referenced by the clipboard. Not created by us.
    FileReference,
}

impl ArtifactOrigin {
    /// Tag used in the artifact file name (`pasted_<tag>_<id>.<ext>`).
    ///
    /// PDFs share the `image` tag with PNG/TIFF pastes.
    pub fn file_tag(self) -> &'static str {
        match self {
            ArtifactOrigin::SpilledText => "text",
            ArtifactOrigin::PastedImage | ArtifactOrigin::PastedPdf => "image",
            ArtifactOrigin::PastedFile => "file",
            ArtifactOrigin::FileReference => "reference",
        }
    }
}

/// A file produced (or referenced) by a paste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub path: PathBuf,
    pub origin: ArtifactOrigin,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>, origin: ArtifactOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }
}

/// Build a collision-free artifact file name.
pub fn artifact_file_name(origin: ArtifactOrigin, ext: &str) -> String {
    format!(
        "pasted_{}_{}.{}",
        origin.file_tag(),
        Uuid::new_v4().as_simple(),
        ext
    )
}

/// Write `bytes` to a fresh artifact file in `dir`.
///
/// The file is created with `create_new`, so an existing file is never
/// overwritten. If the write fails midway the partial file is removed and
/// no artifact is returned.
pub fn write_artifact(
    dir: &Path,
    origin: ArtifactOrigin,
    ext: &str,
    bytes: &[u8],
) -> Result<FileArtifact, String> {
    let path = dir.join(artifact_file_name(origin, ext));
    let mut file = create_new_file(&path)
        .map_err(|e| format!("Failed to create artifact {:?}: {}", path, e))?;

    if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
        drop(file);
        let _ = std::fs::remove_file(&path);
        return Err(format!("Failed to write artifact {:?}: {}", path, e));
    }

    log::debug!(
        "Wrote {} byte {:?} artifact to {:?}",
        bytes.len(),
        origin,
        path
    );
    Ok(FileArtifact::new(path, origin))
}

/// Spill oversized pasted text to `pasted_text_<id>.txt`.
pub fn spill_text(dir: &Path, text: &str) -> Result<FileArtifact, String> {
    write_artifact(dir, ArtifactOrigin::SpilledText, "txt", text.as_bytes())
}

/// Create a new file with owner-only permissions (0600) since pasted content
/// may be private.
#[cfg(unix)]
fn create_new_file(path: &Path) -> Result<std::fs::File, std::io::Error> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_new_file(path: &Path) -> Result<std::fs::File, std::io::Error> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_naming_scheme() {
        let name = artifact_file_name(ArtifactOrigin::PastedPdf, "pdf");
        assert!(name.starts_with("pasted_image_"));
        assert!(name.ends_with(".pdf"));

        let name = artifact_file_name(ArtifactOrigin::PastedFile, "txt");
        assert!(name.starts_with("pasted_file_"));

        let name = artifact_file_name(ArtifactOrigin::SpilledText, "txt");
        assert!(name.starts_with("pasted_text_"));
    }

    #[test]
    fn file_names_are_unique() {
        let a = artifact_file_name(ArtifactOrigin::PastedImage, "png");
        let b = artifact_file_name(ArtifactOrigin::PastedImage, "png");
        assert_ne!(a, b);
    }

    #[test]
    fn spill_text_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let text = "line one\n\tline two with `backticks` and ünïcödé\n";
        let artifact = spill_text(dir.path(), text).unwrap();

        assert_eq!(artifact.origin, ArtifactOrigin::SpilledText);
        assert_eq!(artifact.path.parent(), Some(dir.path()));
        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), text);
    }

    #[test]
    fn write_artifact_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = write_artifact(&missing, ArtifactOrigin::PastedImage, "png", b"\x89PNG")
            .unwrap_err();
        assert!(err.contains("Failed to create artifact"));
        assert!(!missing.exists());
    }

    #[cfg(unix)]
    #[test]
    fn artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let artifact = spill_text(dir.path(), "secret").unwrap();
        let mode = std::fs::metadata(&artifact.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
