//! The directory service: orchestrates root confinement, tree
//! building, the tree cache, the watcher, and the persistence seam.
//!
//! Constructed explicitly and dependency-injected — there are no
//! module-level singletons. The service moves through
//! `NoRoot → RootSet → Watching`; watching is optional and toggled
//! independently of the root.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::config::settings::{MAX_SCAN_DEPTH, MIN_SCAN_DEPTH};
use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::event::ChangeEvent;
use crate::fs::cache::TreeCache;
use crate::fs::entry::is_image_path;
use crate::fs::safety::RootGuard;
use crate::fs::tree::{DirectoryTree, TreeBuilder};
use crate::store::{FolderRecord, Store};
use crate::watch::Watcher;

/// Preference key under which the configured root is persisted.
const PREF_ROOT: &str = "root";
/// Preference key for the watch-enabled flag.
const PREF_WATCH_ENABLED: &str = "watch_enabled";
/// Preference key for the scan depth.
const PREF_SCAN_DEPTH: &str = "scan_depth";

/// Orchestrator over the directory side of the core.
pub struct DirectoryService {
    settings: Settings,
    guard: RootGuard,
    cache: TreeCache,
    watcher: Watcher,
    store: Box<dyn Store>,
}

impl DirectoryService {
    /// Creates a service with no root configured.
    pub fn new(settings: Settings, store: Box<dyn Store>) -> Self {
        Self {
            settings,
            guard: RootGuard::new(),
            cache: TreeCache::new(),
            watcher: Watcher::new(),
            store,
        }
    }

    /// Returns the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the configured canonical root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.guard.root()
    }

    /// Sets the root boundary.
    ///
    /// The candidate is validated without reference to any existing
    /// root. On success the previous watcher is stopped, the tree
    /// cache is invalidated, the root is persisted, and a new watcher
    /// is started (when enabled) — in that order, so nothing from the
    /// old root survives the switch.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidRoot`] — the path is missing, not a
    /// directory, or unreadable. The current root is left unchanged.
    pub fn set_root(&mut self, path: &Path) -> CoreResult<PathBuf> {
        let canonical = RootGuard::validate_root_candidate(path)?;

        self.watcher.stop();
        self.cache.invalidate_all();
        self.store
            .set_pref(PREF_ROOT, &canonical.to_string_lossy());
        self.store.upsert_folder(FolderRecord {
            path: canonical.clone(),
            name: canonical
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            parent: canonical.parent().map(Path::to_path_buf),
            image_count: 0,
            last_scanned: unix_now(),
        });
        self.guard.set_root(canonical.clone());

        if self.settings.watch_enabled {
            if let Err(e) = self.watcher.start(&canonical, &self.settings) {
                // Watching is optional; a root with a broken watch
                // backend is still usable.
                tracing::warn!("watcher failed to start on {}: {e}", canonical.display());
            }
        }
        Ok(canonical)
    }

    /// Clears the root. Stops the watcher and empties the cache.
    pub fn clear_root(&mut self) {
        self.watcher.stop();
        self.cache.invalidate_all();
        self.guard.clear_root();
    }

    /// Returns the cached or freshly built tree for `path` (the root
    /// when `None`), recursing to `max_depth` (clamped to `[1, 20]`).
    ///
    /// Two calls with no intervening invalidation return the same
    /// shared tree.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoRoot`] — no root configured.
    /// - [`CoreError::AccessDenied`] — `path` resolves outside the root.
    /// - Build errors from [`TreeBuilder::build`].
    pub fn get_tree(
        &mut self,
        path: Option<&Path>,
        max_depth: usize,
    ) -> CoreResult<Arc<DirectoryTree>> {
        let target = self.confine_or_root(path)?;
        let depth = max_depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH);

        let builder = TreeBuilder::new(self.settings.clone());
        let tree = self
            .cache
            .get_or_build(&target, depth, || builder.build(&target, depth))?;

        self.store.upsert_folder(FolderRecord {
            path: target.clone(),
            name: tree.root().name.clone(),
            parent: target.parent().map(Path::to_path_buf),
            image_count: tree.root().image_count,
            last_scanned: unix_now(),
        });
        Ok(tree)
    }

    /// Builds (or returns the cached) subtree for a node being
    /// expanded past its loaded depth.
    pub fn expand_node(&mut self, path: &Path, max_depth: usize) -> CoreResult<Arc<DirectoryTree>> {
        self.get_tree(Some(path), max_depth)
    }

    /// Returns whether a directory contains any images, to the loaded
    /// depth.
    pub fn has_images(&mut self, path: &Path, max_depth: usize) -> CoreResult<bool> {
        Ok(self.get_tree(Some(path), max_depth)?.root().has_images)
    }

    /// Counts images under `path` (the root when `None`): direct
    /// children only, or recursively to the configured scan depth.
    pub fn image_count(&mut self, path: Option<&Path>, recursive: bool) -> CoreResult<usize> {
        if recursive {
            let depth = self.settings.scan_depth();
            return Ok(self.get_tree(path, depth)?.root().image_count);
        }

        let target = self.confine_or_root(path)?;
        let read_dir = std::fs::read_dir(&target).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CoreError::PermissionDenied(target.clone())
            } else {
                CoreError::Io(e)
            }
        })?;
        let mut count = 0;
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.settings.is_excluded(&name) {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                && is_image_path(&entry.path())
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Collects the image files under `path` (the root when `None`)
    /// for a duplicate scan — direct children only, or recursively to
    /// the configured scan depth. Unreadable directories are skipped.
    pub fn list_image_files(
        &self,
        path: Option<&Path>,
        recursive: bool,
    ) -> CoreResult<Vec<PathBuf>> {
        let target = self.confine_or_root(path)?;
        let depth = if recursive { self.settings.scan_depth() } else { 1 };
        let mut files = Vec::new();
        self.collect_images(&target, depth, &mut files);
        Ok(files)
    }

    fn collect_images(&self, dir: &Path, depth_remaining: usize, out: &mut Vec<PathBuf>) {
        if depth_remaining == 0 {
            return;
        }
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.settings.is_excluded(&name) {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                self.collect_images(&path, depth_remaining - 1, out);
            } else if is_image_path(&path) {
                out.push(path);
            }
        }
    }

    /// Invalidates the tree cache. Coarse: every entry is dropped.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Starts the watcher on the current root. Silently no-ops when no
    /// root is set or watching is disabled in configuration.
    pub fn start_watching(&mut self) -> CoreResult<()> {
        if !self.settings.watch_enabled {
            return Ok(());
        }
        let Some(root) = self.guard.root().map(Path::to_path_buf) else {
            return Ok(());
        };
        self.watcher.start(&root, &self.settings)
    }

    /// Stops the watcher. Idempotent.
    pub fn stop_watching(&mut self) {
        self.watcher.stop();
    }

    /// Returns `true` while the watcher is active.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_active()
    }

    /// Subscribes to the change-event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.watcher.subscribe()
    }

    /// Enables or disables watching, persisting the preference and
    /// starting or stopping the watcher accordingly.
    pub fn set_watch_enabled(&mut self, enabled: bool) -> CoreResult<()> {
        self.settings.watch_enabled = enabled;
        self.store
            .set_pref(PREF_WATCH_ENABLED, if enabled { "true" } else { "false" });
        if enabled {
            self.start_watching()
        } else {
            self.stop_watching();
            Ok(())
        }
    }

    /// Returns the configured scan depth.
    pub fn scan_depth(&self) -> usize {
        self.settings.scan_depth()
    }

    /// Sets the scan depth (clamped to `[1, 20]`) and persists it.
    pub fn set_scan_depth(&mut self, depth: usize) {
        self.settings.set_scan_depth(depth);
        self.store
            .set_pref(PREF_SCAN_DEPTH, &self.settings.scan_depth().to_string());
    }

    /// Confines `path` to the configured root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccessDenied`] when the path resolves
    /// outside the root or no root is configured.
    pub fn confine(&self, path: &Path) -> CoreResult<PathBuf> {
        self.guard.confine(path)
    }

    /// Resolves `path` against the root: `None` means the root itself,
    /// `Some` is confined to it.
    fn confine_or_root(&self, path: Option<&Path>) -> CoreResult<PathBuf> {
        match path {
            Some(p) => self.guard.confine(p),
            None => self
                .guard
                .root()
                .map(Path::to_path_buf)
                .ok_or(CoreError::NoRoot),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn service() -> DirectoryService {
        let mut settings = Settings::default();
        // Keep watcher lifecycle out of tests that don't target it.
        settings.watch_enabled = false;
        DirectoryService::new(settings, Box::new(MemoryStore::new()))
    }

    fn photo_root() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "AAAA").unwrap();
        fs::write(tmp.path().join("b.jpg"), "AAAA").unwrap();
        fs::create_dir(tmp.path().join("album")).unwrap();
        fs::write(tmp.path().join("album").join("c.jpg"), "BBBB").unwrap();
        fs::write(tmp.path().join("notes.txt"), "t").unwrap();
        tmp
    }

    #[test]
    fn set_root_then_get_tree_has_canonical_root_at_depth_zero() {
        let tmp = photo_root();
        let mut svc = service();

        let canonical = svc.set_root(tmp.path()).unwrap();
        let tree = svc.get_tree(None, 3).unwrap();

        assert_eq!(tree.root().depth, 0);
        assert_eq!(tree.root().path, canonical);
    }

    #[test]
    fn set_root_missing_fails_and_root_unchanged() {
        let tmp = photo_root();
        let mut svc = service();
        let original = svc.set_root(tmp.path()).unwrap();

        let result = svc.set_root(Path::new("/missing"));

        assert!(matches!(result.unwrap_err(), CoreError::InvalidRoot(_)));
        assert_eq!(svc.root(), Some(original.as_path()));
    }

    #[test]
    fn set_root_on_file_fails() {
        let tmp = photo_root();
        let mut svc = service();
        let result = svc.set_root(&tmp.path().join("a.jpg"));
        assert!(matches!(result.unwrap_err(), CoreError::InvalidRoot(_)));
        assert!(svc.root().is_none());
    }

    #[test]
    fn operations_without_root_return_no_root() {
        let mut svc = service();
        assert!(matches!(
            svc.get_tree(None, 3).unwrap_err(),
            CoreError::NoRoot
        ));
        assert!(matches!(
            svc.image_count(None, true).unwrap_err(),
            CoreError::NoRoot
        ));
    }

    #[test]
    fn get_tree_is_idempotent_until_invalidation() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        let first = svc.get_tree(None, 3).unwrap();
        let second = svc.get_tree(None, 3).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        svc.invalidate_cache();
        let third = svc.get_tree(None, 3).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn root_switch_never_serves_old_trees() {
        let tmp_a = photo_root();
        let tmp_b = TempDir::new().unwrap();
        fs::write(tmp_b.path().join("z.png"), "z").unwrap();

        let mut svc = service();
        svc.set_root(tmp_a.path()).unwrap();
        let old = svc.get_tree(None, 3).unwrap();

        svc.set_root(tmp_b.path()).unwrap();
        let fresh = svc.get_tree(None, 3).unwrap();

        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(fresh.root().path, tmp_b.path().canonicalize().unwrap());
    }

    #[test]
    fn clear_root_returns_to_no_root() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        svc.clear_root();

        assert!(svc.root().is_none());
        assert!(!svc.is_watching());
        assert!(matches!(
            svc.get_tree(None, 3).unwrap_err(),
            CoreError::NoRoot
        ));
    }

    #[test]
    fn get_tree_outside_root_is_access_denied() {
        let tmp = photo_root();
        let outside = TempDir::new().unwrap();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        let result = svc.get_tree(Some(outside.path()), 3);
        assert!(matches!(result.unwrap_err(), CoreError::AccessDenied(_)));
    }

    #[test]
    fn expand_node_builds_confined_subtree() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        let subtree = svc.expand_node(&tmp.path().join("album"), 2).unwrap();
        assert_eq!(subtree.root().depth, 0);
        assert_eq!(subtree.root().image_count, 1);
    }

    #[test]
    fn has_images_reflects_contents() {
        let tmp = photo_root();
        let empty = tmp.path().join("empty");
        fs::create_dir(&empty).unwrap();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        assert!(svc.has_images(&tmp.path().join("album"), 2).unwrap());
        assert!(!svc.has_images(&empty, 2).unwrap());
    }

    #[test]
    fn image_count_direct_vs_recursive() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        assert_eq!(svc.image_count(None, false).unwrap(), 2);
        assert_eq!(svc.image_count(None, true).unwrap(), 3);
    }

    #[test]
    fn list_image_files_feeds_duplicate_scans() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        let direct = svc.list_image_files(None, false).unwrap();
        assert_eq!(direct.len(), 2);

        let recursive = svc.list_image_files(None, true).unwrap();
        assert_eq!(recursive.len(), 3);
        assert!(recursive.iter().all(|p| is_image_path(p)));
    }

    #[test]
    fn scan_depth_is_clamped_and_persisted() {
        let mut svc = service();
        svc.set_scan_depth(25);
        assert_eq!(svc.scan_depth(), 20);
        svc.set_scan_depth(0);
        assert_eq!(svc.scan_depth(), 1);
    }

    #[test]
    fn watching_is_a_noop_without_root_or_when_disabled() {
        let mut svc = service();
        svc.start_watching().unwrap();
        assert!(!svc.is_watching());

        let tmp = photo_root();
        svc.set_root(tmp.path()).unwrap();
        // watch_enabled is false in the fixture.
        svc.start_watching().unwrap();
        assert!(!svc.is_watching());
    }

    #[test]
    fn set_watch_enabled_starts_and_stops() {
        let tmp = photo_root();
        let mut svc = service();
        svc.set_root(tmp.path()).unwrap();

        svc.set_watch_enabled(true).unwrap();
        assert!(svc.is_watching());

        svc.set_watch_enabled(false).unwrap();
        assert!(!svc.is_watching());
    }

    #[test]
    fn set_root_starts_watcher_when_enabled() {
        let tmp = photo_root();
        let mut svc =
            DirectoryService::new(Settings::default(), Box::new(MemoryStore::new()));

        svc.set_root(tmp.path()).unwrap();
        assert!(svc.is_watching());

        // And a root switch replaces the watch.
        let tmp2 = TempDir::new().unwrap();
        let canonical2 = svc.set_root(tmp2.path()).unwrap();
        assert!(svc.is_watching());
        drop(canonical2);
    }
}
