//! Directory tree construction.
//!
//! Trees are arenas: [`DirectoryTree`] owns a flat `Vec` of
//! [`TreeNode`]s addressed by [`NodeId`], and nodes reference their
//! children by id. A rebuild produces a whole new tree; nodes are never
//! mutated in place after construction.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::fs::entry::FileDescriptor;

/// Index of a node within its owning [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One directory or image file in a [`DirectoryTree`].
///
/// An unloaded node (`is_loaded == false`) has no children; its
/// `has_images` and `image_count` come from a bounded shallow probe and
/// are best-effort, not exact.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub path: PathBuf,
    pub name: String,
    /// Distance from the tree root; the root is `0`.
    pub depth: usize,
    pub children: Vec<NodeId>,
    pub has_images: bool,
    /// Images directly or recursively contained, to the loaded depth.
    pub image_count: usize,
    pub is_loaded: bool,
    pub is_expanded: bool,
    pub is_dir: bool,
}

/// An immutable snapshot of a directory subtree.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl DirectoryTree {
    /// Returns the id of the root node.
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Returns the root node.
    pub fn root(&self) -> &TreeNode {
        &self.nodes[self.root.0]
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Returns the children of a node in display order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> {
        self.nodes[id.0].children.iter().map(|c| &self.nodes[c.0])
    }

    /// Returns the number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the node for an exact path, if present.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.path == path)
            .map(NodeId)
    }

    /// Toggles the UI expansion flag on a node. This is the only
    /// per-node mutation the tree permits; structure never changes
    /// after construction.
    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        self.nodes[id.0].is_expanded = expanded;
    }
}

/// Builds [`DirectoryTree`]s to a bounded depth.
///
/// Directories at the depth bound become unloaded placeholders whose
/// `has_images` / `image_count` come from a shallow probe of
/// `probe_depth` levels. A read failure on a single entry skips that
/// entry; a read failure on the requested directory itself fails the
/// build.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    settings: Settings,
}

impl TreeBuilder {
    /// Creates a builder using the exclusion patterns and probe depth
    /// from `settings`.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Materializes `path` into a tree, recursing while the current
    /// depth is below `max_depth`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — the path does not exist.
    /// - [`CoreError::NotADirectory`] — the path is not a directory.
    /// - [`CoreError::PermissionDenied`] — the directory itself is
    ///   unreadable.
    pub fn build(&self, path: &Path, max_depth: usize) -> CoreResult<DirectoryTree> {
        if !path.exists() {
            return Err(CoreError::NotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(CoreError::NotADirectory(path.to_path_buf()));
        }

        let mut nodes = Vec::new();
        let root = self.build_dir(&mut nodes, path, 0, max_depth)?;
        Ok(DirectoryTree { nodes, root })
    }

    /// Recursively builds a loaded directory node, returning its id.
    /// Children are pushed before their parent (post-order).
    fn build_dir(
        &self,
        nodes: &mut Vec<TreeNode>,
        path: &Path,
        depth: usize,
        max_depth: usize,
    ) -> CoreResult<NodeId> {
        let entries = self.list_directory(path)?;

        let mut children = Vec::new();
        let mut has_images = false;
        let mut image_count = 0;

        for desc in entries {
            if desc.is_dir() {
                let child = if depth + 1 < max_depth {
                    match self.build_dir(nodes, desc.path(), depth + 1, max_depth) {
                        Ok(id) => id,
                        Err(e) => {
                            tracing::warn!(
                                "skipping unreadable directory {}: {e}",
                                desc.path().display()
                            );
                            continue;
                        }
                    }
                } else {
                    self.placeholder(nodes, &desc, depth + 1)
                };
                has_images |= nodes[child.0].has_images;
                image_count += nodes[child.0].image_count;
                children.push(child);
            } else if desc.is_image() {
                let child = NodeId(nodes.len());
                nodes.push(TreeNode {
                    path: desc.path().to_path_buf(),
                    name: desc.name().to_string(),
                    depth: depth + 1,
                    children: Vec::new(),
                    has_images: true,
                    image_count: 1,
                    is_loaded: true,
                    is_expanded: false,
                    is_dir: false,
                });
                has_images = true;
                image_count += 1;
                children.push(child);
            }
        }

        let id = NodeId(nodes.len());
        nodes.push(TreeNode {
            path: path.to_path_buf(),
            name: display_name(path),
            depth,
            children,
            has_images,
            image_count,
            is_loaded: true,
            is_expanded: false,
            is_dir: true,
        });
        Ok(id)
    }

    /// Creates an unloaded placeholder node for a directory beyond the
    /// depth bound, annotated via the shallow probe.
    fn placeholder(&self, nodes: &mut Vec<TreeNode>, desc: &FileDescriptor, depth: usize) -> NodeId {
        let (has_images, image_count) =
            self.probe_images(desc.path(), self.settings.probe_depth.max(1));
        let id = NodeId(nodes.len());
        nodes.push(TreeNode {
            path: desc.path().to_path_buf(),
            name: desc.name().to_string(),
            depth,
            children: Vec::new(),
            has_images,
            image_count,
            is_loaded: false,
            is_expanded: false,
            is_dir: true,
        });
        id
    }

    /// Lists a directory, applying the exclusion set and the
    /// dirs-first, case-insensitive name ordering. Per-entry errors are
    /// skipped.
    fn list_directory(&self, path: &Path) -> CoreResult<Vec<FileDescriptor>> {
        let read_dir = std::fs::read_dir(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CoreError::PermissionDenied(path.to_path_buf())
            } else {
                CoreError::Io(e)
            }
        })?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let raw_name = dir_entry.file_name().to_string_lossy().into_owned();
            if self.settings.is_excluded(&raw_name) {
                continue;
            }
            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("skipping entry {}: {e}", dir_entry.path().display());
                    continue;
                }
            };
            entries.push(FileDescriptor::new(dir_entry.path(), &metadata));
        }

        entries.sort_by(|a, b| {
            let dir_cmp = b.is_dir().cmp(&a.is_dir());
            if dir_cmp != std::cmp::Ordering::Equal {
                return dir_cmp;
            }
            a.name().to_lowercase().cmp(&b.name().to_lowercase())
        });

        Ok(entries)
    }

    /// Best-effort check for images under `path`, looking at most
    /// `depth_remaining` levels down. Unreadable directories count as
    /// empty.
    fn probe_images(&self, path: &Path, depth_remaining: usize) -> (bool, usize) {
        let Ok(read_dir) = std::fs::read_dir(path) else {
            return (false, 0);
        };

        let mut count = 0;
        for dir_entry in read_dir.flatten() {
            let raw_name = dir_entry.file_name().to_string_lossy().into_owned();
            if self.settings.is_excluded(&raw_name) {
                continue;
            }
            let Ok(file_type) = dir_entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if depth_remaining > 1 {
                    let (_, sub) = self.probe_images(&dir_entry.path(), depth_remaining - 1);
                    count += sub;
                }
            } else if crate::fs::entry::is_image_path(&dir_entry.path()) {
                count += 1;
            }
        }
        (count > 0, count)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| crate::nfc_string(&n.to_string_lossy()))
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
