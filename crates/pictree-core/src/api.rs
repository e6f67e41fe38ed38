//! The UI/CLI boundary.
//!
//! Every operation returns a uniform [`ApiResponse`] envelope; nothing
//! panics or propagates errors across this boundary. [`App`] is the
//! application context that owns the services — constructed explicitly,
//! never a global.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::config::Settings;
use crate::dupes::{CancelFlag, DuplicateDetector, DuplicateGroup};
use crate::error::{CoreError, CoreResult};
use crate::event::ScanProgress;
use crate::fs::tree::DirectoryTree;
use crate::hash::HashEngine;
use crate::service::DirectoryService;
use crate::store::Store;

/// Uniform success/data/error envelope for boundary operations.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Wraps a successful result.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Wraps a failure message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_result(result: CoreResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Summary of the configured root.
#[derive(Debug, Clone, Serialize)]
pub struct RootInfo {
    pub path: PathBuf,
    pub watching: bool,
}

/// Result of a duplicate scan, with the space summary precomputed.
///
/// `groups` may be empty on success — "no duplicates found" is not an
/// error, and a scan where some files were unreadable is still a
/// success (those files are skipped, not fatal).
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    pub wasted_bytes: u64,
    pub redundant_copies: usize,
}

/// Moves files to the OS trash. External collaborator: the core only
/// hands it root-confined paths and never decides which copy to keep.
pub trait TrashProvider: Send {
    /// Moves one file to the trash.
    fn move_to_trash(&self, path: &Path) -> CoreResult<()>;
}

/// Shells out to the platform trash command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTrash;

impl TrashProvider for ShellTrash {
    fn move_to_trash(&self, path: &Path) -> CoreResult<()> {
        let status = trash_command(path)?.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(CoreError::Io(std::io::Error::other(format!(
                "trash command failed for {}",
                path.display()
            ))))
        }
    }
}

#[cfg(target_os = "macos")]
fn trash_command(path: &Path) -> CoreResult<Command> {
    let mut cmd = Command::new("osascript");
    cmd.arg("-e").arg(format!(
        "tell application \"Finder\" to delete POSIX file \"{}\"",
        applescript_quote(&path.to_string_lossy())
    ));
    Ok(cmd)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn trash_command(path: &Path) -> CoreResult<Command> {
    let mut cmd = Command::new("gio");
    cmd.arg("trash").arg(path);
    Ok(cmd)
}

#[cfg(windows)]
fn trash_command(path: &Path) -> CoreResult<Command> {
    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile").arg("-Command").arg(format!(
        "Add-Type -AssemblyName Microsoft.VisualBasic; \
         [Microsoft.VisualBasic.FileIO.FileSystem]::DeleteFile('{}', 'OnlyErrorDialogs', 'SendToRecycleBin')",
        powershell_quote(&path.to_string_lossy())
    ));
    Ok(cmd)
}

/// Escapes a string for interpolation into a double-quoted
/// AppleScript string literal.
#[cfg(any(target_os = "macos", test))]
fn applescript_quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escapes a string for interpolation into a single-quoted PowerShell
/// string literal, where `'` is doubled.
#[cfg(any(windows, test))]
fn powershell_quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// Application context owning the core services.
pub struct App {
    service: DirectoryService,
    detector: DuplicateDetector,
    trash: Box<dyn TrashProvider>,
}

impl App {
    /// Builds an application context from its injected collaborators.
    pub fn new(settings: Settings, store: Box<dyn Store>, trash: Box<dyn TrashProvider>) -> Self {
        Self {
            service: DirectoryService::new(settings, store),
            detector: DuplicateDetector::new(HashEngine::default()),
            trash,
        }
    }

    /// Direct access to the directory service, for frontends that need
    /// the event subscription or finer control.
    pub fn service(&self) -> &DirectoryService {
        &self.service
    }

    /// Mutable access to the directory service.
    pub fn service_mut(&mut self) -> &mut DirectoryService {
        &mut self.service
    }

    /// Sets the root and reports its state.
    pub fn set_root(&mut self, path: &Path) -> ApiResponse<RootInfo> {
        ApiResponse::from_result(self.service.set_root(path).map(|canonical| RootInfo {
            path: canonical,
            watching: self.service.is_watching(),
        }))
    }

    /// Reports the configured root.
    pub fn root_info(&self) -> ApiResponse<RootInfo> {
        match self.service.root() {
            Some(root) => ApiResponse::ok(RootInfo {
                path: root.to_path_buf(),
                watching: self.service.is_watching(),
            }),
            None => ApiResponse::err(CoreError::NoRoot.to_string()),
        }
    }

    /// Clears the root.
    pub fn clear_root(&mut self) -> ApiResponse<()> {
        self.service.clear_root();
        ApiResponse::ok(())
    }

    /// Returns the tree for `path` (root when `None`) at `max_depth`.
    pub fn get_tree(&mut self, path: Option<&Path>, max_depth: usize) -> ApiResponse<DirectoryTree> {
        ApiResponse::from_result(
            self.service
                .get_tree(path, max_depth)
                .map(|tree| (*tree).clone()),
        )
    }

    /// Expands one node to `max_depth`.
    pub fn expand_node(&mut self, path: &Path, max_depth: usize) -> ApiResponse<DirectoryTree> {
        ApiResponse::from_result(
            self.service
                .expand_node(path, max_depth)
                .map(|tree| (*tree).clone()),
        )
    }

    /// Counts images under `path` (root when `None`).
    pub fn image_count(&mut self, path: Option<&Path>, recursive: bool) -> ApiResponse<usize> {
        ApiResponse::from_result(self.service.image_count(path, recursive))
    }

    /// Starts watching; reports whether the watcher is now active.
    pub fn start_watching(&mut self) -> ApiResponse<bool> {
        ApiResponse::from_result(
            self.service
                .start_watching()
                .map(|_| self.service.is_watching()),
        )
    }

    /// Stops watching.
    pub fn stop_watching(&mut self) -> ApiResponse<bool> {
        self.service.stop_watching();
        ApiResponse::ok(false)
    }

    /// Reads the watch-enabled flag.
    pub fn watch_enabled(&self) -> ApiResponse<bool> {
        ApiResponse::ok(self.service.settings().watch_enabled)
    }

    /// Writes the watch-enabled flag.
    pub fn set_watch_enabled(&mut self, enabled: bool) -> ApiResponse<bool> {
        ApiResponse::from_result(self.service.set_watch_enabled(enabled).map(|_| enabled))
    }

    /// Reads the scan depth.
    pub fn scan_depth(&self) -> ApiResponse<usize> {
        ApiResponse::ok(self.service.scan_depth())
    }

    /// Writes the scan depth; out-of-range values are clamped.
    pub fn set_scan_depth(&mut self, depth: usize) -> ApiResponse<usize> {
        self.service.set_scan_depth(depth);
        ApiResponse::ok(self.service.scan_depth())
    }

    /// Scans for duplicates under `path` (root when `None`), direct
    /// children only or recursively to the configured scan depth.
    pub fn scan_duplicates<F>(
        &mut self,
        path: Option<&Path>,
        recursive: bool,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> ApiResponse<DuplicateReport>
    where
        F: FnMut(ScanProgress),
    {
        let result = self
            .service
            .list_image_files(path, recursive)
            .and_then(|files| self.detector.scan(&files, cancel, on_progress))
            .map(|groups| {
                let (wasted_bytes, redundant_copies) = DuplicateDetector::wasted_space(&groups);
                DuplicateReport {
                    groups,
                    wasted_bytes,
                    redundant_copies,
                }
            });
        ApiResponse::from_result(result)
    }

    /// Moves a chosen subset of a duplicate group's members to the
    /// trash. Refuses to delete every member, paths not in the group,
    /// and paths outside the root. Per-file trash failures are logged
    /// and skipped; the count of files actually trashed is returned.
    pub fn delete_duplicates(
        &mut self,
        group: &DuplicateGroup,
        discard: &[PathBuf],
    ) -> ApiResponse<usize> {
        if discard.is_empty() {
            return ApiResponse::err("nothing selected to delete");
        }
        if discard.len() >= group.files.len() {
            return ApiResponse::err("refusing to delete every copy in a duplicate group");
        }
        for path in discard {
            if !group.files.contains(path) {
                return ApiResponse::err(format!(
                    "{} is not a member of this duplicate group",
                    path.display()
                ));
            }
            if let Err(e) = self.service.confine(path) {
                return ApiResponse::err(e.to_string());
            }
        }

        let mut trashed = 0;
        for path in discard {
            match self.trash.move_to_trash(path) {
                Ok(()) => trashed += 1,
                Err(e) => {
                    tracing::warn!("failed to trash {}: {e}", path.display());
                }
            }
        }
        ApiResponse::ok(trashed)
    }
}
