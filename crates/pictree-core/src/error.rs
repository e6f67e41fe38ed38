//! Error types for `pictree-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::PathBuf;

/// Unified error type for all core operations.
///
/// Each variant captures just enough context for the caller to display
/// a meaningful message or take corrective action.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A path offered as the library root is missing, not a directory,
    /// or unreadable. Fatal to `set_root`; recoverable by retrying with
    /// a different path.
    #[error("invalid root: {0}")]
    InvalidRoot(PathBuf),

    /// The target path does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to access the path.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A directory was expected but the path points to a file.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A regular file was expected but the path points to something else.
    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    /// The path resolves outside the configured root boundary.
    #[error("access denied: {0} is outside the configured root")]
    AccessDenied(PathBuf),

    /// An operation that requires a root was called before one was set.
    #[error("no root configured")]
    NoRoot,

    /// The filesystem watcher failed to start or register a path.
    #[error("watcher error: {0}")]
    Watcher(String),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// A long-running operation was cancelled between files.
    #[error("operation cancelled")]
    Cancelled,

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `pictree-core`.
pub type CoreResult<T> = Result<T, CoreError>;
