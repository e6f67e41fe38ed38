//! File descriptor representation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::nfc_string;

/// File extensions classified as images, lowercase.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff", "heic", "heif", "dng", "cr2",
    "nef", "arw",
];

/// Returns `true` if the path's extension classifies it as an image.
///
/// The check is case-insensitive on the extension and never touches
/// the filesystem.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// A single file or directory as seen in one directory listing.
///
/// `FileDescriptor` is immutable and read fresh from the OS on every
/// listing; it is never cached beyond a single call. Directory sizes
/// are reported as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    path: PathBuf,
    name: String,
    size: u64,
    modified: Option<SystemTime>,
    is_dir: bool,
    is_image: bool,
}

impl FileDescriptor {
    /// Creates a new `FileDescriptor` from a path and its metadata.
    ///
    /// The display name is normalized to NFC so decomposed filenames
    /// (as produced by macOS) compare and render consistently.
    pub fn new(path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| nfc_string(&n.to_string_lossy()))
            .unwrap_or_default();
        let is_dir = metadata.is_dir();
        let is_image = !is_dir && is_image_path(&path);

        Self {
            path,
            name,
            size: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
            is_dir,
            is_image,
        }
    }

    /// Returns the full path of this entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the NFC-normalized file or directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file size in bytes. Always `0` for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last-modified time, if available.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Returns `true` if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Returns `true` if this entry is classified as an image file.
    pub fn is_image(&self) -> bool {
        self.is_image
    }
}
