//! Pictree core library — UI-agnostic photo organizer logic.
//!
//! `pictree-core` provides the foundational types and operations for
//! building a photo organizer frontend. It is intentionally decoupled
//! from any UI framework so that the CLI (`pictree-cli`) and a future
//! GUI frontend can share the same underlying logic.
//!
//! # Modules
//!
//! - [`fs`] — File system abstractions: root confinement, the arena directory tree, the tree cache.
//! - [`hash`] — Content hashing: streamed full hashes and sampled quick hashes.
//! - [`dupes`] — Two-phase duplicate detection with progress and cancellation.
//! - [`watch`] — Live file system change notifications.
//! - [`service`] — The orchestrating [`DirectoryService`].
//! - [`api`] — The [`App`] context and the [`ApiResponse`] boundary envelope.
//! - [`store`] — Preference and folder persistence.
//! - [`config`] — User-facing configuration (TOML-based settings).
//! - [`event`] — Change and progress event types for Core → UI communication.
//! - [`error`] — Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod api;
pub mod config;
pub mod dupes;
pub mod error;
pub mod event;
pub mod fs;
pub mod hash;
pub mod service;
pub mod store;
pub mod watch;

pub use api::{ApiResponse, App, DuplicateReport, RootInfo, ShellTrash, TrashProvider};
pub use config::Settings;
pub use dupes::{CancelFlag, DuplicateDetector, DuplicateGroup};
pub use error::{CoreError, CoreResult};
pub use event::{ChangeEvent, ScanPhase, ScanProgress};
pub use fs::cache::TreeCache;
pub use fs::entry::{is_image_path, FileDescriptor};
pub use fs::safety::RootGuard;
pub use fs::tree::{DirectoryTree, NodeId, TreeBuilder, TreeNode};
pub use hash::{HashEngine, HashResult};
pub use service::DirectoryService;
pub use store::{FolderRecord, JsonStore, MemoryStore, Store};
pub use watch::Watcher;

/// Normalises a string to NFC (composed) form.
///
/// macOS stores filenames in NFD (decomposed), which makes visually
/// identical names compare unequal. This helper re-composes them.
pub fn nfc_string(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}
