//! Settings loaded from `config.toml` in the platform config directory.
//! Every field has a default, so a missing file or section is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Coords;
use crate::state::{Capture, History, UndoPolicy};

const APP_DIR: &str = "roadtrip";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store file; defaults to `<data dir>/roadtrip/store.json`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout; unset waits as long as the server takes
    pub timeout_secs: Option<u64>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("roadtrip/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: None,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum snapshots kept; unset keeps everything
    pub capacity: Option<usize>,
    pub undo: UndoPolicy,
    pub capture: Capture,
}

impl HistoryConfig {
    pub fn build(&self) -> History {
        let history = match self.capacity {
            Some(cap) => History::with_capacity(cap),
            None => History::new(),
        };
        history.with_policy(self.undo)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Initial view center as `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self { center: [39.5, -98.35], zoom: 4 }
    }
}

impl MapConfig {
    pub fn center(&self) -> Coords {
        Coords::new(self.center[0], self.center[1]).unwrap_or(Coords { lat: 39.5, lon: -98.35 })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub geocoder: GeocoderConfig,
    pub history: HistoryConfig,
    pub map: MapConfig,
}

impl Config {
    /// `<config dir>/roadtrip/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from an explicit path, or from the default location when `path`
    /// is `None`. Only the default location may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::default_path() {
                Ok(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        if let Some(p) = &self.storage.path {
            return p.clone();
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("store.json")
    }

    /// Log file, kept next to the store
    pub fn log_path(&self) -> PathBuf {
        self.store_path().with_file_name("roadtrip.log")
    }
}
