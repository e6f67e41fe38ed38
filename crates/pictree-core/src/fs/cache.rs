//! Memoization of built directory trees.
//!
//! Entries are keyed by `(path, max_depth)` and only exact-key lookups
//! hit: a tree built at depth 3 is never served for a depth-2 request,
//! even though it is logically a superset. Invalidation removes whole
//! entries; trees themselves are immutable and shared via `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::CoreResult;
use crate::fs::tree::DirectoryTree;

/// Concurrent cache of [`DirectoryTree`] snapshots.
///
/// Reads take a shared lock; invalidation takes the write lock. The
/// lock is never held across a build.
#[derive(Debug, Default)]
pub struct TreeCache {
    entries: RwLock<HashMap<(PathBuf, usize), Arc<DirectoryTree>>>,
}

impl TreeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached tree for an exact `(path, max_depth)` key.
    pub fn get(&self, path: &Path, max_depth: usize) -> Option<Arc<DirectoryTree>> {
        let entries = self.entries.read().expect("tree cache lock poisoned");
        entries.get(&(path.to_path_buf(), max_depth)).cloned()
    }

    /// Returns the cached tree or builds and caches a new one.
    ///
    /// The build closure runs without the lock held, so concurrent
    /// readers are never blocked on I/O. If two callers race, the
    /// first inserted tree wins and both receive it.
    pub fn get_or_build<F>(
        &self,
        path: &Path,
        max_depth: usize,
        build: F,
    ) -> CoreResult<Arc<DirectoryTree>>
    where
        F: FnOnce() -> CoreResult<DirectoryTree>,
    {
        if let Some(tree) = self.get(path, max_depth) {
            return Ok(tree);
        }

        let built = Arc::new(build()?);
        let mut entries = self.entries.write().expect("tree cache lock poisoned");
        let entry = entries
            .entry((path.to_path_buf(), max_depth))
            .or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(entry))
    }

    /// Removes every cached depth for one path.
    pub fn invalidate(&self, path: &Path) {
        let mut entries = self.entries.write().expect("tree cache lock poisoned");
        entries.retain(|(p, _), _| p != path);
    }

    /// Removes every entry. Must be called before the first build of a
    /// new root so no tree from the old root is ever served.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().expect("tree cache lock poisoned");
        entries.clear();
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("tree cache lock poisoned").len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::fs::tree::TreeBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn build_fixture(tmp: &TempDir) {
        fs::write(tmp.path().join("a.jpg"), "a").unwrap();
    }

    #[test]
    fn get_on_empty_cache_misses() {
        let cache = TreeCache::new();
        assert!(cache.get(Path::new("/photos"), 3).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn get_or_build_caches_result() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        let first = cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .unwrap();
        let second = cache
            .get_or_build(tmp.path(), 3, || panic!("should not rebuild"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_depth_is_a_different_key() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        let shallow = cache
            .get_or_build(tmp.path(), 1, || builder.build(tmp.path(), 1))
            .unwrap();
        let deep = cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .unwrap();

        assert!(!Arc::ptr_eq(&shallow, &deep));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn build_failure_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        let missing = tmp.path().join("missing");
        assert!(cache
            .get_or_build(&missing, 3, || builder.build(&missing, 3))
            .is_err());
        assert!(cache.is_empty());

        // A later successful build for another key still works.
        assert!(cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .is_ok());
    }

    #[test]
    fn invalidate_removes_all_depths_for_path() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let other = TempDir::new().unwrap();
        build_fixture(&other);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        for depth in [1, 2, 3] {
            cache
                .get_or_build(tmp.path(), depth, || builder.build(tmp.path(), depth))
                .unwrap();
        }
        cache
            .get_or_build(other.path(), 2, || builder.build(other.path(), 2))
            .unwrap();

        cache.invalidate(tmp.path());

        assert!(cache.get(tmp.path(), 1).is_none());
        assert!(cache.get(tmp.path(), 2).is_none());
        assert!(cache.get(tmp.path(), 3).is_none());
        assert!(cache.get(other.path(), 2).is_some());
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .unwrap();
        cache.invalidate_all();

        assert!(cache.is_empty());
    }

    #[test]
    fn rebuild_after_invalidation_is_a_fresh_tree() {
        let tmp = TempDir::new().unwrap();
        build_fixture(&tmp);
        let cache = TreeCache::new();
        let builder = TreeBuilder::new(Settings::default());

        let first = cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .unwrap();
        cache.invalidate_all();
        let second = cache
            .get_or_build(tmp.path(), 3, || builder.build(tmp.path(), 3))
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
