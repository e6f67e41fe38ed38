//! Live filesystem watching under the configured root.
//!
//! Uses [`notify`] with one non-recursive registration per directory,
//! applied from the root down to [`MAX_WATCH_DEPTH`] levels. Changes
//! below that bound are simply not observed — a documented limitation,
//! not an error. Classified [`ChangeEvent`]s fan out over a broadcast
//! channel, so a slow or dropped subscriber never blocks the others.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::event::ChangeEvent;
use crate::fs::entry::is_image_path;

/// How many directory levels below the root receive a watch
/// registration. Fixed small constant for performance.
pub const MAX_WATCH_DEPTH: usize = 4;

/// Capacity of the broadcast channel carrying change events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ActiveWatch {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

/// Watches the root for filesystem changes and broadcasts
/// [`ChangeEvent`]s.
pub struct Watcher {
    tx: broadcast::Sender<ChangeEvent>,
    active: Option<ActiveWatch>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    /// Creates an inactive watcher.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx, active: None }
    }

    /// Returns `true` while a watch is registered.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the root currently being watched, if any.
    pub fn watched_root(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.root.as_path())
    }

    /// Returns a new subscription to the change-event stream.
    ///
    /// Each subscriber gets its own receiver; lagging only drops that
    /// subscriber's oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Starts watching `root`, replacing any previous watch.
    ///
    /// Registers the root and each subdirectory down to
    /// [`MAX_WATCH_DEPTH`], skipping excluded names. A subdirectory
    /// that cannot be registered is logged and skipped; a root that
    /// cannot be registered fails the call.
    ///
    /// # Errors
    ///
    /// [`CoreError::Watcher`] if the backend cannot be initialised or
    /// the root cannot be watched.
    pub fn start(&mut self, root: &Path, settings: &Settings) -> CoreResult<()> {
        self.stop();

        let tx = self.tx.clone();
        let filter = settings.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in classify(&event, &filter) {
                        if tx.send(change).is_err() {
                            tracing::trace!("change event dropped: no subscribers");
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(ChangeEvent::WatcherError(e.to_string()));
                }
            },
        )
        .map_err(|e| CoreError::Watcher(e.to_string()))?;

        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|e| CoreError::Watcher(e.to_string()))?;
        register_subdirs(&mut watcher, root, settings, MAX_WATCH_DEPTH);

        self.active = Some(ActiveWatch {
            watcher,
            root: root.to_path_buf(),
        });
        Ok(())
    }

    /// Stops watching. Idempotent; safe to call when not started.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            let _ = active.watcher.unwatch(&active.root);
        }
    }
}

/// Registers non-recursive watches on subdirectories, depth-first,
/// down to `depth_remaining` more levels. Failures are per-directory.
fn register_subdirs(
    watcher: &mut RecommendedWatcher,
    dir: &Path,
    settings: &Settings,
    depth_remaining: usize,
) {
    if depth_remaining == 0 {
        return;
    }
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if settings.is_excluded(&name) {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
            tracing::warn!("failed to watch {}: {e}", path.display());
            continue;
        }
        register_subdirs(watcher, &path, settings, depth_remaining - 1);
    }
}

/// Maps a raw notify event to zero or more [`ChangeEvent`]s.
///
/// File events are filtered to image extensions; directory events are
/// unfiltered. Excluded names produce nothing. Renames decompose into
/// a remove of the old path and an add of the new one.
fn classify(event: &notify::Event, settings: &Settings) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();
    for (i, path) in event.paths.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if settings.is_excluded(&name) {
            continue;
        }

        let change = match &event.kind {
            EventKind::Create(CreateKind::Folder) => {
                Some(ChangeEvent::DirectoryAdded(path.clone()))
            }
            EventKind::Create(_) => classify_added(path),
            EventKind::Remove(kind) => classify_removed(path, *kind),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                // Rename events carry no removal kind.
                RenameMode::From => classify_removed(path, RemoveKind::Any),
                RenameMode::To => classify_added(path),
                // Both: first path is the old name, second the new.
                RenameMode::Both => {
                    if i == 0 {
                        classify_removed(path, RemoveKind::Any)
                    } else {
                        classify_added(path)
                    }
                }
                _ => None,
            },
            EventKind::Modify(_) => {
                if path.is_dir() {
                    None
                } else if is_image_path(path) {
                    Some(ChangeEvent::FileChanged(path.clone()))
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(change) = change {
            changes.push(change);
        }
    }
    changes
}

/// A path that still exists can be inspected for dir-ness; files are
/// image-filtered.
fn classify_added(path: &Path) -> Option<ChangeEvent> {
    if path.is_dir() {
        Some(ChangeEvent::DirectoryAdded(path.to_path_buf()))
    } else if is_image_path(path) {
        Some(ChangeEvent::FileAdded(path.to_path_buf()))
    } else {
        None
    }
}

/// A removed path can no longer be inspected, so the backend's removal
/// kind is authoritative where it gives one. Kinds that leave the kind
/// open fall back to the extension: image extensions mean a file, and
/// everything else is reported as a directory so no directory removal
/// (dotted names included) goes unreported.
fn classify_removed(path: &Path, kind: RemoveKind) -> Option<ChangeEvent> {
    match kind {
        RemoveKind::Folder => Some(ChangeEvent::DirectoryRemoved(path.to_path_buf())),
        RemoveKind::File => {
            if is_image_path(path) {
                Some(ChangeEvent::FileRemoved(path.to_path_buf()))
            } else {
                None
            }
        }
        _ => {
            if is_image_path(path) {
                Some(ChangeEvent::FileRemoved(path.to_path_buf()))
            } else {
                Some(ChangeEvent::DirectoryRemoved(path.to_path_buf()))
            }
        }
    }
}
