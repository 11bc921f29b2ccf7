//! [`ClipboardSource`] backed by the platform clipboard via `arboard`.
//!
//! `arboard` exposes images as raw RGBA and text as UTF-8, so the image is
//! re-encoded to PNG and text is only used when it is a file locator list.
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::clipboard::{ClipboardItem, ClipboardRepresentation, ClipboardSource, ClipboardType};
use crate::util;

/// System clipboard reader. A platform handle is opened per read, so the
/// reader holds no OS resources between pastes.
#[derive(Debug, Clone, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn open() -> Option<arboard::Clipboard> {
        match arboard::Clipboard::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                log::warn!("Failed to open system clipboard: {}", e);
                None
            }
        }
    }
}

impl ClipboardSource for SystemClipboard {
    fn items(&mut self) -> Vec<ClipboardItem> {
        let Some(mut manager) = Self::open() else {
            return Vec::new();
        };

        let mut representations = Vec::new();

        if let Ok(image) = manager.get_image() {
            match encode_png(image.width, image.height, image.bytes.into_owned()) {
                Ok(png) => representations.push(ClipboardRepresentation {
                    kind: ClipboardType::Png,
                    data: png,
                }),
                Err(e) => log::warn!("Failed to encode clipboard image: {}", e),
            }
        }

        if let Ok(text) = manager.get_text() {
            if is_uri_list(&text) {
                representations.push(ClipboardRepresentation {
                    kind: ClipboardType::FileReference,
                    data: text.into_bytes(),
                });
            }
        }

        if representations.is_empty() {
            Vec::new()
        } else {
            vec![ClipboardItem::new(representations)]
        }
    }

    fn file_references(&mut self) -> Vec<PathBuf> {
        let Some(mut manager) = Self::open() else {
            return Vec::new();
        };
        match manager.get_text() {
            Ok(text) => existing_paths(&text),
            Err(_) => Vec::new(),
        }
    }
}

/// Encode raw RGBA pixels as PNG.
pub fn encode_png(width: usize, height: usize, rgba: Vec<u8>) -> Result<Vec<u8>, String> {
    let width = u32::try_from(width).map_err(|_| format!("Image width {} too large", width))?;
    let height = u32::try_from(height).map_err(|_| format!("Image height {} too large", height))?;
    let buffer = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| format!("RGBA buffer does not match {}x{}", width, height))?;

    let mut png = Vec::new();
    buffer
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {}", e))?;
    Ok(png)
}

/// Text is treated as a file list only when every meaningful line is a
/// `file://` URL.
fn is_uri_list(text: &str) -> bool {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .peekable();
    lines.peek().is_some()
        && lines.all(|line| line.starts_with("file://") && util::file_locator_to_path(line).is_some())
}

/// Plain absolute paths (one per line) that exist on disk.
fn existing_paths(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| Path::new(line).is_absolute())
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .collect()
}
