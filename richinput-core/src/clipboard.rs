//! Clipboard model and paste normalization.
//!
//! A file paste in the WebView only tells us *that* files were pasted; the
//! script sandbox cannot read binary contents. On a `filePasted` signal the
//! host re-reads the system clipboard through a [`ClipboardSource`] and
//! [`normalize_paste`] turns whatever it finds into [`FileArtifact`]s.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifacts::{self, ArtifactOrigin, FileArtifact};
use crate::util;

/// Classified clipboard type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClipboardType {
    FileReference,
    Png,
    Tiff,
    Pdf,
    FileContents,
    Other(String),
}

impl ClipboardType {
    /// Classify a raw type tag. Both macOS pasteboard UTIs and MIME types
    /// are recognized.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "public.file-url" | "text/uri-list" | "NSFilenamesPboardType" => {
                ClipboardType::FileReference
            }
            "public.png" | "image/png" => ClipboardType::Png,
            "public.tiff" | "image/tiff" | "NeXT TIFF v4.0 pasteboard type" => ClipboardType::Tiff,
            "com.adobe.pdf" | "application/pdf" => ClipboardType::Pdf,
            "NSFileContentsPboardType"
            | "com.apple.pasteboard.promised-file-content-type"
            | "application/octet-stream" => ClipboardType::FileContents,
            other => ClipboardType::Other(other.to_string()),
        }
    }

    /// Canonical tag for this type (used when re-serializing).
    pub fn type_tag(&self) -> &str {
        match self {
            ClipboardType::FileReference => "public.file-url",
            ClipboardType::Png => "public.png",
            ClipboardType::Tiff => "public.tiff",
            ClipboardType::Pdf => "com.adobe.pdf",
            ClipboardType::FileContents => "NSFileContentsPboardType",
            ClipboardType::Other(tag) => tag,
        }
    }

    /// Artifact origin and file extension for binary payload types.
    fn artifact_kind(&self) -> Option<(ArtifactOrigin, &'static str)> {
        match self {
            ClipboardType::Png => Some((ArtifactOrigin::PastedImage, "png")),
            ClipboardType::Tiff => Some((ArtifactOrigin::PastedImage, "tiff")),
            ClipboardType::Pdf => Some((ArtifactOrigin::PastedPdf, "pdf")),
            ClipboardType::FileContents => Some((ArtifactOrigin::PastedFile, "txt")),
            ClipboardType::FileReference | ClipboardType::Other(_) => None,
        }
    }
}

impl Serialize for ClipboardType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_tag())
    }
}

impl<'de> Deserialize<'de> for ClipboardType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ClipboardType::from_type_tag(&tag))
    }
}

/// One (type, bytes) pair exposed by a clipboard item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardRepresentation {
    #[serde(rename = "type")]
    pub kind: ClipboardType,
    pub data: Vec<u8>,
}

impl ClipboardRepresentation {
    pub fn new(type_tag: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ClipboardType::from_type_tag(type_tag),
            data: data.into(),
        }
    }
}

/// A logical clipboard item, possibly offered in several representations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub representations: Vec<ClipboardRepresentation>,
}

impl ClipboardItem {
    pub fn new(representations: Vec<ClipboardRepresentation>) -> Self {
        Self { representations }
    }
}

/// Read access to a clipboard at paste time.
///
/// Implement this for the platform pasteboard; it is read once per paste.
pub trait ClipboardSource: Send {
    /// All items currently on the clipboard, in clipboard order.
    fn items(&mut self) -> Vec<ClipboardItem>;

    /// Generic file-reference objects, consulted only when no item
    /// representation produced an artifact.
    fn file_references(&mut self) -> Vec<PathBuf>;
}

/// In-memory clipboard contents.
///
/// Used by hosts that snapshot the pasteboard themselves and by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryClipboard {
    pub items: Vec<ClipboardItem>,
    pub file_references: Vec<PathBuf>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ClipboardItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_file_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_references.push(path.into());
        self
    }

    /// Append a representation to the item at `index`. An index one past
    /// the end starts a new item; anything further is rejected.
    pub fn push_representation(
        &mut self,
        index: usize,
        representation: ClipboardRepresentation,
    ) -> bool {
        if index > self.items.len() {
            log::warn!(
                "Clipboard item index {} out of range ({} items)",
                index,
                self.items.len()
            );
            return false;
        }
        if index == self.items.len() {
            self.items.push(ClipboardItem::default());
        }
        self.items[index].representations.push(representation);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.file_references.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.file_references.clear();
    }
}

impl ClipboardSource for MemoryClipboard {
    fn items(&mut self) -> Vec<ClipboardItem> {
        self.items.clone()
    }

    fn file_references(&mut self) -> Vec<PathBuf> {
        self.file_references.clone()
    }
}

/// Turn the clipboard's current contents into file artifacts.
///
/// Every usable representation of every item contributes; there is no
/// de-duplication across representations of the same item. Failures on a
/// single representation are logged and skipped. An empty result means the
/// paste produced nothing, which is not an error.
pub fn normalize_paste(source: &mut dyn ClipboardSource, dir: &Path) -> Vec<FileArtifact> {
    let mut artifacts = Vec::new();

    for (index, item) in source.items().iter().enumerate() {
        for representation in &item.representations {
            collect_representation(index, representation, dir, &mut artifacts);
        }
    }

    if !artifacts.is_empty() {
        return artifacts;
    }

    let references = source.file_references();
    if !references.is_empty() {
        log::debug!(
            "No clipboard representation was usable; using {} file reference(s)",
            references.len()
        );
    }
    references
        .into_iter()
        .map(|path| FileArtifact::new(path, ArtifactOrigin::FileReference))
        .collect()
}

fn collect_representation(
    index: usize,
    representation: &ClipboardRepresentation,
    dir: &Path,
    artifacts: &mut Vec<FileArtifact>,
) {
    if let ClipboardType::Other(tag) = &representation.kind {
        log::info!("Skipping unsupported clipboard type {:?} (item {})", tag, index);
        return;
    }

    if representation.kind == ClipboardType::FileReference {
        let Ok(locator) = std::str::from_utf8(&representation.data) else {
            log::warn!("Clipboard file reference (item {}) is not valid UTF-8", index);
            return;
        };
        let paths = util::parse_file_locators(locator);
        if paths.is_empty() {
            log::warn!("Clipboard file reference (item {}) is not a file locator", index);
        }
        artifacts.extend(
            paths
                .into_iter()
                .map(|path| FileArtifact::new(path, ArtifactOrigin::FileReference)),
        );
        return;
    }

    let Some((origin, ext)) = representation.kind.artifact_kind() else {
        return;
    };
    match artifacts::write_artifact(dir, origin, ext, &representation.data) {
        Ok(artifact) => artifacts.push(artifact),
        Err(e) => log::error!("Dropping pasted {}: {}", representation.kind.type_tag(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-png-body";

    #[test]
    fn classifies_utis_and_mime_types() {
        assert_eq!(ClipboardType::from_type_tag("public.png"), ClipboardType::Png);
        assert_eq!(ClipboardType::from_type_tag("image/png"), ClipboardType::Png);
        assert_eq!(ClipboardType::from_type_tag("public.tiff"), ClipboardType::Tiff);
        assert_eq!(ClipboardType::from_type_tag("application/pdf"), ClipboardType::Pdf);
        assert_eq!(
            ClipboardType::from_type_tag("public.file-url"),
            ClipboardType::FileReference
        );
        assert_eq!(
            ClipboardType::from_type_tag("NSFileContentsPboardType"),
            ClipboardType::FileContents
        );
        assert_eq!(
            ClipboardType::from_type_tag("public.utf8-plain-text"),
            ClipboardType::Other("public.utf8-plain-text".to_string())
        );
    }

    #[test]
    fn single_png_becomes_one_png_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new().with_item(ClipboardItem::new(vec![
            ClipboardRepresentation::new("public.png", PNG_BYTES),
        ]));

        let artifacts = normalize_paste(&mut clipboard, dir.path());

        assert_eq!(artifacts.len(), 1);
        let artifact = &artifacts[0];
        assert_eq!(artifact.origin, ArtifactOrigin::PastedImage);
        assert_eq!(artifact.path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), PNG_BYTES);
    }

    #[test]
    fn extensions_per_binary_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new()
            .with_item(ClipboardItem::new(vec![ClipboardRepresentation::new(
                "image/tiff",
                b"II*\0".to_vec(),
            )]))
            .with_item(ClipboardItem::new(vec![ClipboardRepresentation::new(
                "com.adobe.pdf",
                b"%PDF-1.7".to_vec(),
            )]))
            .with_item(ClipboardItem::new(vec![ClipboardRepresentation::new(
                "NSFileContentsPboardType",
                b"raw".to_vec(),
            )]));

        let artifacts = normalize_paste(&mut clipboard, dir.path());
        let names: Vec<String> = artifacts
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names.len(), 3);
        assert!(names[0].starts_with("pasted_image_") && names[0].ends_with(".tiff"));
        assert!(names[1].starts_with("pasted_image_") && names[1].ends_with(".pdf"));
        assert!(names[2].starts_with("pasted_file_") && names[2].ends_with(".txt"));
        assert_eq!(artifacts[1].origin, ArtifactOrigin::PastedPdf);
    }

    #[test]
    fn file_reference_is_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new().with_item(ClipboardItem::new(vec![
            ClipboardRepresentation::new("public.file-url", "file:///Users/me/Desktop/plan.key"),
        ]));

        let artifacts = normalize_paste(&mut clipboard, dir.path());

        assert_eq!(
            artifacts,
            vec![FileArtifact::new(
                "/Users/me/Desktop/plan.key",
                ArtifactOrigin::FileReference
            )]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn multiple_representations_of_one_item_all_contribute() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new().with_item(ClipboardItem::new(vec![
            ClipboardRepresentation::new("public.png", PNG_BYTES),
            ClipboardRepresentation::new("public.tiff", b"II*\0".to_vec()),
        ]));

        let artifacts = normalize_paste(&mut clipboard, dir.path());
        assert_eq!(artifacts.len(), 2);
    }

    #[test]
    fn unknown_types_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new().with_item(ClipboardItem::new(vec![
            ClipboardRepresentation::new("public.rtf", b"{\\rtf1}".to_vec()),
            ClipboardRepresentation::new("public.png", PNG_BYTES),
        ]));

        let artifacts = normalize_paste(&mut clipboard, dir.path());
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].origin, ArtifactOrigin::PastedImage);
    }

    #[test]
    fn falls_back_to_file_references() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new()
            .with_item(ClipboardItem::new(vec![ClipboardRepresentation::new(
                "public.html",
                b"<p>hi</p>".to_vec(),
            )]))
            .with_file_reference("/tmp/a.txt")
            .with_file_reference("/tmp/b.txt");

        let artifacts = normalize_paste(&mut clipboard, dir.path());
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts
            .iter()
            .all(|a| a.origin == ArtifactOrigin::FileReference));
    }

    #[test]
    fn empty_clipboard_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = MemoryClipboard::new();
        assert!(normalize_paste(&mut clipboard, dir.path()).is_empty());
    }

    #[test]
    fn write_failure_drops_only_that_representation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut clipboard = MemoryClipboard::new().with_item(ClipboardItem::new(vec![
            ClipboardRepresentation::new("public.png", PNG_BYTES),
            ClipboardRepresentation::new("public.file-url", "file:///tmp/kept.txt"),
        ]));

        let artifacts = normalize_paste(&mut clipboard, &missing);
        assert_eq!(
            artifacts,
            vec![FileArtifact::new("/tmp/kept.txt", ArtifactOrigin::FileReference)]
        );
    }

    #[test]
    fn push_representation_appends_items() {
        let mut clipboard = MemoryClipboard::new();
        assert!(clipboard.push_representation(0, ClipboardRepresentation::new("public.png", PNG_BYTES)));
        assert!(clipboard.push_representation(0, ClipboardRepresentation::new("public.tiff", "t")));
        assert!(clipboard.push_representation(1, ClipboardRepresentation::new("com.adobe.pdf", "p")));
        assert_eq!(clipboard.items.len(), 2);
        assert_eq!(clipboard.items[0].representations.len(), 2);
        assert!(!clipboard.is_empty());
        clipboard.clear();
        assert!(clipboard.is_empty());
    }

    #[test]
    fn push_representation_rejects_gaps() {
        let mut clipboard = MemoryClipboard::new();
        assert!(!clipboard.push_representation(1, ClipboardRepresentation::new("public.png", "x")));
        assert!(!clipboard.push_representation(
            u32::MAX as usize,
            ClipboardRepresentation::new("public.png", "x")
        ));
        assert!(clipboard.is_empty());
    }

    #[test]
    fn memory_clipboard_deserializes_type_tags() {
        let clipboard: MemoryClipboard = serde_json::from_str(
            r#"{"items": [{"representations": [{"type": "image/png", "data": [1, 2, 3]}]}]}"#,
        )
        .unwrap();
        assert_eq!(clipboard.items[0].representations[0].kind, ClipboardType::Png);
        assert_eq!(clipboard.items[0].representations[0].data, vec![1, 2, 3]);
    }
}
