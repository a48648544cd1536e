use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::model::EntityKind;
use crate::state::{Collections, History, Snapshot};
use crate::storage::KeyValueStore;

pub const HISTORY_KEY: &str = "history";
pub const VERSION_KEY: &str = "version";
pub const SCHEMA_VERSION: u32 = 1;

/// Everything read from the store at startup
#[derive(Debug, Default)]
pub struct Loaded {
    pub collections: Collections,
    pub snapshots: Vec<Snapshot>,
    /// Recovered problems worth showing to the user
    pub warnings: Vec<String>,
}

/// Reads and writes the entity collections and history through a key-value store
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read all keys. Missing or malformed values become empty collections.
    pub fn load(&mut self) -> Loaded {
        let mut warnings = Vec::new();

        if let Some(raw) = self.store.get(VERSION_KEY) {
            match raw.trim().parse::<u32>() {
                Ok(v) if v > SCHEMA_VERSION => {
                    warn!(version = v, supported = SCHEMA_VERSION, "store written by a newer schema, loading best-effort");
                    warnings.push(format!("Store schema v{} is newer than v{}", v, SCHEMA_VERSION));
                }
                Ok(_) => {}
                Err(_) => warn!(value = %raw, "unreadable schema version, assuming v1"),
            }
        }

        let collections = Collections {
            itinerary: self.read_list(EntityKind::Itinerary.key(), &mut warnings),
            meals: self.read_list(EntityKind::Meals.key(), &mut warnings),
            pois: self.read_list(EntityKind::Pois.key(), &mut warnings),
            hotels: self.read_list(EntityKind::Hotels.key(), &mut warnings),
        };

        let raw_history: Vec<String> = self.read_list(HISTORY_KEY, &mut warnings);
        let mut snapshots = Vec::with_capacity(raw_history.len());
        let mut skipped = 0usize;
        for (idx, raw) in raw_history.iter().enumerate() {
            match serde_json::from_str::<Collections>(raw) {
                Ok(c) => snapshots.push(Snapshot::capture(&c)),
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping malformed history snapshot");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warnings.push(format!("Dropped {} unreadable history entries", skipped));
        }

        debug!(
            itinerary = collections.itinerary.len(),
            meals = collections.meals.len(),
            pois = collections.pois.len(),
            hotels = collections.hotels.len(),
            history = snapshots.len(),
            "state loaded"
        );

        Loaded { collections, snapshots, warnings }
    }

    /// Write the four collections, the history and the schema version as one batch
    pub fn save(&mut self, collections: &Collections, history: &History) -> Result<(), StorageError> {
        let snapshots = history
            .snapshots()
            .map(|s| serde_json::to_string(s.collections()))
            .collect::<Result<Vec<String>, _>>()?;

        let entries = [
            (EntityKind::Itinerary.key(), to_json(&collections.itinerary)?),
            (EntityKind::Meals.key(), to_json(&collections.meals)?),
            (EntityKind::Pois.key(), to_json(&collections.pois)?),
            (EntityKind::Hotels.key(), to_json(&collections.hotels)?),
            (HISTORY_KEY, to_json(&snapshots)?),
            (VERSION_KEY, SCHEMA_VERSION.to_string()),
        ];
        self.store.set_batch(&entries)?;
        debug!(history = snapshots.len(), "state saved");
        Ok(())
    }

    #[cfg(test)]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Read one list, keeping every entry that parses. A value that is not
    /// a list at all is copied to `<key>.bak` before it can be overwritten.
    fn read_list<T: DeserializeOwned>(&mut self, key: &str, warnings: &mut Vec<String>) -> Vec<T> {
        let Some(raw) = self.store.get(key) else {
            return Vec::new();
        };
        let values = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(values) => values,
            Err(e) => {
                let backup = format!("{}.bak", key);
                warn!(key, backup = %backup, error = %e, "malformed value in store, using empty list");
                if let Err(e) = self.store.set_batch(&[(backup.as_str(), raw)]) {
                    warn!(key, error = %e, "could not back up malformed value");
                }
                warnings.push(format!("Ignored unreadable '{}' data (copy kept in '{}')", key, backup));
                return Vec::new();
            }
        };

        let total = values.len();
        let list: Vec<T> = values
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key, index = idx, error = %e, "skipping malformed entry");
                    None
                }
            })
            .collect();
        if list.len() < total {
            warnings.push(format!("Dropped {} unreadable '{}' entries", total - list.len(), key));
        }
        list
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}
