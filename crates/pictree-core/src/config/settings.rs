//! Application configuration loaded from a TOML file.
//!
//! All fields have sensible defaults so pictree works without a config
//! file. Call [`Settings::load`] to read from a TOML path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Lower bound for the tree scan depth.
pub const MIN_SCAN_DEPTH: usize = 1;
/// Upper bound for the tree scan depth.
pub const MAX_SCAN_DEPTH: usize = 20;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether the filesystem watcher starts when a root is set.
    #[serde(default = "default_true")]
    pub watch_enabled: bool,
    /// How deep the tree builder recurses. Clamped to `[1, 20]`.
    #[serde(default = "default_scan_depth")]
    scan_depth: usize,
    /// How deep the shallow probe looks when marking unloaded
    /// placeholder nodes. Default 1.
    #[serde(default = "default_probe_depth")]
    pub probe_depth: usize,
    /// Entry names containing any of these substrings are skipped
    /// during traversal and watch filtering. Case-sensitive.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_enabled: true,
            scan_depth: default_scan_depth(),
            probe_depth: default_probe_depth(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl Settings {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        let mut settings: Settings =
            toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        settings.scan_depth = settings.scan_depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH);
        Ok(settings)
    }

    /// Returns the scan depth, always within `[1, 20]`.
    pub fn scan_depth(&self) -> usize {
        self.scan_depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH)
    }

    /// Sets the scan depth, clamping out-of-range values to `[1, 20]`.
    pub fn set_scan_depth(&mut self, depth: usize) {
        self.scan_depth = depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH);
    }

    /// Returns `true` if an entry with this raw name should be skipped.
    ///
    /// Hidden names (leading `.`) are always excluded; the configured
    /// patterns match as case-sensitive substrings of the raw name.
    pub fn is_excluded(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }
        self.exclude_patterns.iter().any(|p| name.contains(p))
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_depth() -> usize {
    5
}

fn default_probe_depth() -> usize {
    1
}

fn default_exclude_patterns() -> Vec<String> {
    [
        ".git",
        ".svn",
        "node_modules",
        "$RECYCLE.BIN",
        "System Volume Information",
        ".photoslibrary",
        ".Trash",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
