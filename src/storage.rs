use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// A local string-to-string store, the equivalent of a browser's local storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    /// Write every entry or none of them
    fn set_batch(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    #[cfg(test)]
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_batch(&[(key, value)])
    }
}

/// In-memory store with an optional size quota (bytes of keys plus values)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self { entries: HashMap::new(), quota: Some(quota) }
    }

    fn size_with(&self, entries: &[(&str, String)]) -> usize {
        let mut sizes: HashMap<&str, usize> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), k.len() + v.len()))
            .collect();
        for (k, v) in entries {
            sizes.insert(k, k.len() + v.len());
        }
        sizes.values().sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_batch(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        if let Some(limit) = self.quota {
            let needed = self.size_with(entries);
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }
        for (k, v) in entries {
            self.entries.insert(k.to_string(), v.clone());
        }
        Ok(())
    }
}

/// Store kept as one JSON document of string values. Each batch replaces the
/// document atomically through a temp file in the same directory.
pub struct FileStore {
    pub path: PathBuf,
    entries: BTreeMap<String, String>,
    /// Problems found while opening, for display
    pub warnings: Vec<String>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut warnings = Vec::new();

        if !path.exists() {
            info!(path = %path.display(), "store file not found, starting empty");
            warnings.push(format!("New store: {}", path.display()));
            return Ok(Self { path, entries: BTreeMap::new(), warnings });
        }

        let content = fs::read_to_string(&path)?;
        let entries = match serde_json::from_str::<BTreeMap<String, String>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                let backup = backup_path(&path);
                warn!(error = %e, path = %path.display(), backup = %backup.display(), "store file is malformed, starting empty");
                if let Err(e) = fs::copy(&path, &backup) {
                    warn!(error = %e, "could not back up malformed store file");
                }
                warnings.push(format!("Store file unreadable, starting empty (backup: {})", backup.display()));
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), keys = entries.len(), "store file opened");
        Ok(Self { path, entries, warnings })
    }

    fn write_document(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_batch(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        for (k, v) in entries {
            next.insert(k.to_string(), v.clone());
        }
        self.write_document(&next)?;
        self.entries = next;
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}
