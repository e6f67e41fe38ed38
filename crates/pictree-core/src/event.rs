//! Change and progress events.
//!
//! [`ChangeEvent`]s are produced by the filesystem watcher and fanned out
//! to subscribers over a broadcast channel; they are ephemeral and never
//! persisted. [`ScanProgress`] reports per-file progress from the
//! duplicate detector so a frontend can render one progress bar per phase.

use std::path::PathBuf;

/// A filesystem change observed under the configured root.
///
/// File variants are only emitted for image files; directory variants
/// are unfiltered. Events carry absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An image file appeared.
    FileAdded(PathBuf),
    /// An image file was removed.
    FileRemoved(PathBuf),
    /// An image file's content changed.
    FileChanged(PathBuf),
    /// A directory appeared.
    DirectoryAdded(PathBuf),
    /// A directory was removed.
    DirectoryRemoved(PathBuf),
    /// The underlying watch reported an error. Watching continues if
    /// the watch itself is still alive.
    WatcherError(String),
}

/// The duplicate scan phase a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Quick-hash pre-filter over every candidate file.
    Quick,
    /// Full-hash confirmation over candidate duplicate sets only.
    Confirm,
}

/// One per-file progress report from a duplicate scan.
///
/// Within a phase, `index` increases monotonically from 1 to `total`.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// 1-based index of the file just processed within this phase.
    pub index: usize,
    /// Number of files this phase will process.
    pub total: usize,
    /// The file the report refers to.
    pub path: PathBuf,
}
