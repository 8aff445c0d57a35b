//! Accessory cache.
//!
//! The last published reading of every sensor, keyed by sensor id and
//! stored as JSON. A restarted service seeds each sensor from its entry so
//! sticky values survive restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use airsense_core::SensorReading;

/// One cached accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessory {
    /// Display name at the time it was cached.
    pub name: String,
    /// Last published reading.
    pub reading: SensorReading,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub updated_at: Option<OffsetDateTime>,
}

/// Accessory cache backed by a JSON file.
#[derive(Debug, Clone)]
pub struct AccessoryCache {
    path: PathBuf,
    entries: BTreeMap<Uuid, CachedAccessory>,
}

impl AccessoryCache {
    /// An empty cache that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Open the cache at `path`; a missing file is an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::new(path));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| CacheError::Read {
            path: path.clone(),
            source: e,
        })?;
        let entries = serde_json::from_str(&content).map_err(|e| CacheError::Parse {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path, entries })
    }

    /// Open the cache at `path`, starting empty if the file is unreadable
    /// or corrupt.
    ///
    /// A discarded cache only loses sticky values; the next cycle refills
    /// them.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("{}; starting with an empty accessory cache", e);
                Self::new(path)
            }
        }
    }

    /// Write the cache to its file, creating parent directories.
    pub fn save(&self) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(&self.entries).map_err(CacheError::Serialize)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Write beside the target, then rename over it.
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, content).map_err(|e| CacheError::Write {
            path: temp.clone(),
            source: e,
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| CacheError::Write {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &Uuid) -> Option<&CachedAccessory> {
        self.entries.get(id)
    }

    /// Record the latest reading for `id`.
    pub fn update(&mut self, id: Uuid, name: &str, reading: SensorReading) {
        self.entries.insert(
            id,
            CachedAccessory {
                name: name.to_string(),
                reading,
                updated_at: Some(OffsetDateTime::now_utc()),
            },
        );
    }

    /// Drop the entry for `id`, returning it if it existed.
    pub fn remove(&mut self, id: &Uuid) -> Option<CachedAccessory> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accessory cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to read accessory cache {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse accessory cache {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize accessory cache: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write accessory cache {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Default accessory cache path.
pub fn default_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airsense")
        .join("accessories.json")
}
