//! Persisted `symbol:provider` → last quote mapping.
//!
//! The cache file is a single JSON document read and written whole. A cycle
//! runs its load, evaluate and store steps inside one critical section so two
//! overlapping cycles cannot lose each other's updates.

use overseer_types::PriceQuote;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type PriceMap = BTreeMap<String, PriceQuote>;

/// Read the whole cache. A missing file is an empty cache.
pub fn load_cache(path: &Path) -> Result<PriceMap, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PriceMap::new()),
        Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
    };
    if raw.trim().is_empty() {
        return Ok(PriceMap::new());
    }
    serde_json::from_str(&raw).map_err(|e| format!("Corrupt price cache {}: {}", path.display(), e))
}

/// Write the whole cache, replacing the previous file atomically
pub fn save_cache(path: &Path, map: &PriceMap) -> Result<(), String> {
    let json = serde_json::to_string_pretty(map)
        .map_err(|e| format!("Failed to serialize price cache: {}", e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| format!("Failed to write {}: {}", tmp.display(), e))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| format!("Failed to replace {}: {}", path.display(), e))
}

pub struct PriceCache {
    path: Option<PathBuf>,
    entries: Mutex<PriceMap>,
}

impl PriceCache {
    /// Cache backed by a JSON file. An unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_cache(&path) {
            Ok(map) => {
                log::info!(
                    "[PRICE_CACHE] Loaded {} cached quotes from {}",
                    map.len(),
                    path.display()
                );
                map
            }
            Err(e) => {
                log::warn!("[PRICE_CACHE] {}, starting with an empty cache", e);
                PriceMap::new()
            }
        };
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(PriceMap::new()),
        }
    }

    pub fn snapshot(&self) -> PriceMap {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Load, mutate and store the whole cache as one critical section.
    /// No network I/O may happen inside `f`.
    pub fn update_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PriceMap) -> R,
    {
        let mut entries = self.entries.lock();

        if let Some(path) = &self.path {
            match load_cache(path) {
                Ok(map) => *entries = map,
                Err(e) => log::warn!("[PRICE_CACHE] {}, using in-memory copy", e),
            }
        }

        let result = f(&mut *entries);

        if let Some(path) = &self.path {
            if let Err(e) = save_cache(path, &entries) {
                log::error!("[PRICE_CACHE] {}", e);
            }
        }

        result
    }
}
