//! File system abstractions: descriptors, root confinement, the
//! directory tree arena, and the tree cache.

pub mod cache;
pub mod entry;
pub mod safety;
pub mod tree;

pub use cache::TreeCache;
pub use entry::{is_image_path, FileDescriptor};
pub use safety::RootGuard;
pub use tree::{DirectoryTree, NodeId, TreeBuilder, TreeNode};
