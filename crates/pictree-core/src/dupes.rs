//! Two-phase duplicate detection.
//!
//! Phase 1 computes the cheap quick hash for every candidate file and
//! groups by it; only groups with two or more members go to phase 2,
//! where the full content hash confirms (or splits) each candidate set.
//! Phase 2 never starts before phase 1 has finished for the whole
//! input, and full hashes are never computed for quick-hash singletons.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::event::{ScanPhase, ScanProgress};
use crate::hash::HashEngine;

/// A set of files with byte-identical content. Always two or more
/// members.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// Hex SHA-256 digest shared by every member.
    pub hash: String,
    /// Common file size in bytes.
    pub size: u64,
    /// Member paths, in scan encounter order.
    pub files: Vec<PathBuf>,
}

/// Cooperative cancellation signal for long-running scans.
///
/// Checked once per file boundary; there is no mid-file granularity.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`CancelFlag::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Finds groups of byte-identical files.
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    engine: HashEngine,
}

impl DuplicateDetector {
    /// Creates a detector over the given hash engine.
    pub fn new(engine: HashEngine) -> Self {
        Self { engine }
    }

    /// Scans `paths` for duplicates, reporting per-file progress once
    /// per phase.
    ///
    /// Files that fail to hash (unreadable, removed mid-scan) are
    /// skipped silently — a partially degraded scan is still a
    /// successful scan. Groups are sorted by descending member count,
    /// ties by digest for a stable order.
    ///
    /// # Errors
    ///
    /// [`CoreError::Cancelled`] if `cancel` is raised between files.
    pub fn scan<F>(
        &self,
        paths: &[PathBuf],
        cancel: &CancelFlag,
        mut on_progress: F,
    ) -> CoreResult<Vec<DuplicateGroup>>
    where
        F: FnMut(ScanProgress),
    {
        // Phase 1: quick-hash pre-filter over every path.
        let mut quick_groups: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let total = paths.len();
        for (i, path) in paths.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            match self.engine.quick_hash(path) {
                Ok(digest) => quick_groups.entry(digest).or_default().push(path.clone()),
                Err(e) => {
                    tracing::debug!("quick hash failed for {}: {e}", path.display());
                }
            }
            on_progress(ScanProgress {
                phase: ScanPhase::Quick,
                index: i + 1,
                total,
                path: path.clone(),
            });
        }

        // Candidate sets: quick-hash groups with two or more members.
        // Singletons never pay for a full hash.
        let mut candidates: Vec<(String, Vec<PathBuf>)> = quick_groups
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        // Phase 2: full-hash confirmation.
        let confirm_total: usize = candidates.iter().map(|(_, m)| m.len()).sum();
        let mut confirmed: HashMap<String, DuplicateGroup> = HashMap::new();
        let mut confirm_index = 0;
        for (_, members) in candidates {
            for path in members {
                if cancel.is_cancelled() {
                    return Err(CoreError::Cancelled);
                }
                confirm_index += 1;
                match self.engine.full_hash(&path) {
                    Ok(result) => {
                        confirmed
                            .entry(result.digest.clone())
                            .or_insert_with(|| DuplicateGroup {
                                hash: result.digest,
                                size: result.size,
                                files: Vec::new(),
                            })
                            .files
                            .push(path.clone());
                    }
                    Err(e) => {
                        tracing::debug!("full hash failed for {}: {e}", path.display());
                    }
                }
                on_progress(ScanProgress {
                    phase: ScanPhase::Confirm,
                    index: confirm_index,
                    total: confirm_total,
                    path,
                });
            }
        }

        // Quick hashes collide by design; drop groups the full hash
        // reduced to a single member.
        let mut groups: Vec<DuplicateGroup> = confirmed
            .into_values()
            .filter(|g| g.files.len() >= 2)
            .collect();
        groups.sort_by(|a, b| {
            b.files
                .len()
                .cmp(&a.files.len())
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(groups)
    }

    /// Returns `(bytes, redundant_copies)` recoverable by keeping
    /// exactly one copy per group. Which copy to keep is the caller's
    /// decision.
    pub fn wasted_space(groups: &[DuplicateGroup]) -> (u64, usize) {
        let mut bytes = 0u64;
        let mut copies = 0usize;
        for group in groups {
            let extra = group.files.len().saturating_sub(1);
            bytes += group.size * extra as u64;
            copies += extra;
        }
        (bytes, copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn scan_quiet(detector: &DuplicateDetector, paths: &[PathBuf]) -> Vec<DuplicateGroup> {
        detector.scan(paths, &CancelFlag::new(), |_| {}).unwrap()
    }

    fn write_files(tmp: &TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, content)| {
                let path = tmp.path().join(name);
                fs::write(&path, content).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn scan_finds_identical_pair() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "AAAA"), ("b.jpg", "AAAA"), ("c.jpg", "BBBB")]);

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].size, 4);
        assert_eq!(groups[0].files.len(), 2);
        assert!(groups[0].files.contains(&paths[0]));
        assert!(groups[0].files.contains(&paths[1]));
    }

    #[test]
    fn scan_no_duplicates_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "one"), ("b.jpg", "twoo"), ("c.jpg", "three")]);

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);
        assert!(groups.is_empty());
    }

    #[test]
    fn scan_never_returns_singleton_groups_and_members_subset_input() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(
            &tmp,
            &[
                ("a.jpg", "dup"),
                ("b.jpg", "dup"),
                ("c.jpg", "dup"),
                ("d.jpg", "lone"),
            ],
        );

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);

        for group in &groups {
            assert!(group.files.len() >= 2);
            for file in &group.files {
                assert!(paths.contains(file));
            }
        }
    }

    #[test]
    fn quick_hash_false_positive_split_by_phase_two() {
        // Equal size, equal first/last chunks, different interior.
        let tmp = TempDir::new().unwrap();
        let mut content_a = vec![1u8; 64];
        let mut content_b = vec![1u8; 64];
        content_a[32] = 10;
        content_b[32] = 20;
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        fs::write(&a, &content_a).unwrap();
        fs::write(&b, &content_b).unwrap();

        let detector = DuplicateDetector::new(HashEngine::new(8));
        let groups = scan_quiet(&detector, &[a, b]);

        assert!(groups.is_empty());
    }

    #[test]
    fn groups_sorted_by_descending_member_count() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(
            &tmp,
            &[
                ("p1.jpg", "pair"),
                ("p2.jpg", "pair"),
                ("t1.jpg", "trio"),
                ("t2.jpg", "trio"),
                ("t3.jpg", "trio"),
            ],
        );

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].files.len(), 3);
        assert_eq!(groups[1].files.len(), 2);
    }

    #[test]
    fn unreadable_files_are_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut paths = write_files(&tmp, &[("a.jpg", "same"), ("b.jpg", "same")]);
        paths.push(tmp.path().join("vanished.jpg"));

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn progress_reported_per_file_per_phase() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "dup"), ("b.jpg", "dup"), ("c.jpg", "solo")]);

        let mut quick = Vec::new();
        let mut confirm = Vec::new();
        DuplicateDetector::default()
            .scan(&paths, &CancelFlag::new(), |p| match p.phase {
                ScanPhase::Quick => quick.push(p.index),
                ScanPhase::Confirm => confirm.push(p.index),
            })
            .unwrap();

        // One quick report per input file, monotonically increasing.
        assert_eq!(quick, vec![1, 2, 3]);
        // Only the two-member candidate set reaches phase 2.
        assert_eq!(confirm, vec![1, 2]);
    }

    #[test]
    fn phase_two_starts_after_phase_one_completes() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "dup"), ("b.jpg", "dup"), ("c.jpg", "dup")]);

        let mut phases = Vec::new();
        DuplicateDetector::default()
            .scan(&paths, &CancelFlag::new(), |p| phases.push(p.phase))
            .unwrap();

        let first_confirm = phases
            .iter()
            .position(|p| *p == ScanPhase::Confirm)
            .unwrap();
        assert!(phases[..first_confirm]
            .iter()
            .all(|p| *p == ScanPhase::Quick));
        assert_eq!(first_confirm, paths.len());
    }

    #[test]
    fn cancellation_between_files_returns_cancelled() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "x"), ("b.jpg", "y"), ("c.jpg", "z")]);

        let cancel = CancelFlag::new();
        let handle = cancel.clone();
        let result = DuplicateDetector::default().scan(&paths, &cancel, move |p| {
            if p.index == 1 {
                handle.cancel();
            }
        });

        assert!(matches!(result.unwrap_err(), CoreError::Cancelled));
    }

    #[test]
    fn wasted_space_counts_redundant_copies() {
        let tmp = TempDir::new().unwrap();
        let paths = write_files(&tmp, &[("a.jpg", "AAAA"), ("b.jpg", "AAAA"), ("c.jpg", "BBBB")]);

        let groups = scan_quiet(&DuplicateDetector::default(), &paths);
        let (bytes, copies) = DuplicateDetector::wasted_space(&groups);

        assert_eq!(bytes, 4);
        assert_eq!(copies, 1);
    }

    #[test]
    fn wasted_space_empty_groups_is_zero() {
        let (bytes, copies) = DuplicateDetector::wasted_space(&[]);
        assert_eq!(bytes, 0);
        assert_eq!(copies, 0);
    }

    #[test]
    fn wasted_space_three_member_group() {
        let group = DuplicateGroup {
            hash: "h".to_string(),
            size: 1024,
            files: vec![
                Path::new("/a").to_path_buf(),
                Path::new("/b").to_path_buf(),
                Path::new("/c").to_path_buf(),
            ],
        };
        let (bytes, copies) = DuplicateDetector::wasted_space(&[group]);
        assert_eq!(bytes, 2048);
        assert_eq!(copies, 2);
    }

    #[test]
    fn scan_empty_input_is_empty_success() {
        let groups = scan_quiet(&DuplicateDetector::default(), &[]);
        assert!(groups.is_empty());
    }
}
