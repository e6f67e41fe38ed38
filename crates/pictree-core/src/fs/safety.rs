//! Root confinement for externally supplied paths.
//!
//! Every path that reaches the core from outside the trusted internal
//! tree walk (UI requests, CLI arguments) must pass through
//! [`RootGuard`] before any filesystem access.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Confines filesystem operations to a single configured root.
///
/// With no root configured every check denies: absence of a root never
/// means unrestricted access.
#[derive(Debug, Clone, Default)]
pub struct RootGuard {
    root: Option<PathBuf>,
}

impl RootGuard {
    /// Creates a guard with no configured root. All checks deny.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configured canonical root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Sets the root boundary. The path must already be canonical;
    /// use [`RootGuard::validate_root_candidate`] first.
    pub fn set_root(&mut self, root: PathBuf) {
        self.root = Some(root);
    }

    /// Clears the root boundary. Subsequent checks deny everything.
    pub fn clear_root(&mut self) {
        self.root = None;
    }

    /// Returns `true` iff `path` resolves to the root itself or to a
    /// location strictly inside it.
    ///
    /// Never fails: unresolvable paths and a missing root both return
    /// `false`.
    pub fn is_within_root(&self, path: &Path) -> bool {
        let Some(root) = &self.root else {
            return false;
        };
        let Ok(resolved) = path.canonicalize() else {
            return false;
        };
        resolved == *root || resolved.starts_with(root)
    }

    /// Canonicalizes `path` and verifies it lies within the root.
    ///
    /// # Errors
    ///
    /// [`CoreError::AccessDenied`] if no root is configured, the path
    /// cannot be resolved, or it resolves outside the boundary.
    pub fn confine(&self, path: &Path) -> CoreResult<PathBuf> {
        let Some(root) = &self.root else {
            return Err(CoreError::AccessDenied(path.to_path_buf()));
        };
        let resolved = path
            .canonicalize()
            .map_err(|_| CoreError::AccessDenied(path.to_path_buf()))?;
        if resolved == *root || resolved.starts_with(root) {
            Ok(resolved)
        } else {
            Err(CoreError::AccessDenied(path.to_path_buf()))
        }
    }

    /// Validates a prospective root: it must exist, be a directory, and
    /// be listable. Returns the canonical path.
    ///
    /// Deliberately independent of any already-configured root — this
    /// check is what establishes one.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidRoot`] for any failure.
    pub fn validate_root_candidate(path: &Path) -> CoreResult<PathBuf> {
        let canonical = path
            .canonicalize()
            .map_err(|_| CoreError::InvalidRoot(path.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(CoreError::InvalidRoot(path.to_path_buf()));
        }
        std::fs::read_dir(&canonical).map_err(|_| CoreError::InvalidRoot(path.to_path_buf()))?;
        Ok(canonical)
    }
}
