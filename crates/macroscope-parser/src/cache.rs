//! LRU cache for parsed units
//!
//! Keeps recently parsed units in memory keyed by path, validated by a
//! content hash so stale entries never satisfy a request for changed
//! text.

use crate::ParsedUnit;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Cache entry with validation metadata
#[derive(Clone)]
struct CacheEntry {
    content_hash: u64,
    unit: Arc<ParsedUnit>,
}

/// LRU cache for parsed units
pub struct UnitCache {
    /// Maximum number of entries
    capacity: usize,
    /// Cache entries
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
    /// Access order for LRU eviction
    access_order: RwLock<Vec<PathBuf>>,
}

impl UnitCache {
    /// Create a new cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            access_order: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Get a cached unit when its content hash still matches
    pub fn get(&self, path: &Path, content_hash: u64) -> Option<Arc<ParsedUnit>> {
        let entries = self.entries.read().ok()?;
        if let Some(entry) = entries.get(path) {
            if entry.content_hash == content_hash {
                let unit = entry.unit.clone();
                drop(entries);
                self.touch(path);
                return Some(unit);
            }
        }
        None
    }

    /// Insert or replace a cached unit, returning the shared handle
    pub fn insert(&self, path: PathBuf, unit: ParsedUnit) -> Arc<ParsedUnit> {
        let unit = Arc::new(unit);
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(_) => return unit,
        };

        if entries.len() >= self.capacity && !entries.contains_key(&path) {
            self.evict_lru(&mut entries);
        }

        entries.insert(
            path.clone(),
            CacheEntry {
                content_hash: unit.content_hash,
                unit: unit.clone(),
            },
        );
        drop(entries);
        self.touch(&path);
        unit
    }

    /// Remove an entry
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(path);
        }
        if let Ok(mut order) = self.access_order.write() {
            order.retain(|p| p != path);
        }
    }

    /// Clear all entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        if let Ok(mut order) = self.access_order.write() {
            order.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().map(|e| e.len()).unwrap_or(0);
        CacheStats {
            entries,
            capacity: self.capacity,
        }
    }

    fn touch(&self, path: &Path) {
        if let Ok(mut order) = self.access_order.write() {
            order.retain(|p| p != path);
            order.push(path.to_path_buf());
        }
    }

    fn evict_lru(&self, entries: &mut HashMap<PathBuf, CacheEntry>) {
        if let Ok(mut order) = self.access_order.write() {
            if let Some(oldest) = order.first().cloned() {
                entries.remove(&oldest);
                order.remove(0);
            }
        }
    }
}

impl Default for UnitCache {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
}

/// Content hash used for change detection
pub fn hash_content(content: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}
