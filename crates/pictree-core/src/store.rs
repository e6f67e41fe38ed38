//! Persistence collaborator seam.
//!
//! The core treats its metadata store purely as string key/value
//! preferences plus upsert-by-path folder records. [`JsonStore`] keeps
//! everything in a single JSON file (load returns an empty store on any
//! error, saves are best-effort); [`MemoryStore`] backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One indexed folder, as handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub path: PathBuf,
    pub name: String,
    pub parent: Option<PathBuf>,
    pub image_count: usize,
    /// Unix timestamp (seconds) of the last scan that touched this
    /// folder.
    pub last_scanned: u64,
}

/// Key/value preferences plus folder records, keyed by path.
pub trait Store: Send {
    /// Stores a string preference.
    fn set_pref(&mut self, key: &str, value: &str);

    /// Returns a stored preference, if present.
    fn pref(&self, key: &str) -> Option<String>;

    /// Inserts or replaces the record for `record.path`.
    fn upsert_folder(&mut self, record: FolderRecord);

    /// Returns the record for a path, if present.
    fn folder(&self, path: &Path) -> Option<FolderRecord>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    prefs: HashMap<String, String>,
    folders: HashMap<PathBuf, FolderRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn set_pref(&mut self, key: &str, value: &str) {
        self.prefs.insert(key.to_string(), value.to_string());
    }

    fn pref(&self, key: &str) -> Option<String> {
        self.prefs.get(key).cloned()
    }

    fn upsert_folder(&mut self, record: FolderRecord) {
        self.folders.insert(record.path.clone(), record);
    }

    fn folder(&self, path: &Path) -> Option<FolderRecord> {
        self.folders.get(path).cloned()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    prefs: HashMap<String, String>,
    #[serde(default)]
    folders: HashMap<PathBuf, FolderRecord>,
}

/// JSON-file-backed store.
///
/// Every mutation rewrites the file. Loading a missing or corrupt file
/// yields an empty store rather than an error.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonStore {
    /// Opens the store at `path`, creating an empty one if the file is
    /// missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => StoreData::default(),
        };
        Self {
            path: path.to_path_buf(),
            data,
        }
    }

    /// Best-effort write, creating parent directories as needed.
    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&self.data) {
            let _ = std::fs::write(&self.path, json);
        }
    }
}

impl Store for JsonStore {
    fn set_pref(&mut self, key: &str, value: &str) {
        self.data.prefs.insert(key.to_string(), value.to_string());
        self.save();
    }

    fn pref(&self, key: &str) -> Option<String> {
        self.data.prefs.get(key).cloned()
    }

    fn upsert_folder(&mut self, record: FolderRecord) {
        self.data.folders.insert(record.path.clone(), record);
        self.save();
    }

    fn folder(&self, path: &Path) -> Option<FolderRecord> {
        self.data.folders.get(path).cloned()
    }
}
