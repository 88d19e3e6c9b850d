// ABOUTME: Bounded in-memory store of rendered thumbnails keyed by source path
// ABOUTME: Delegates overflow handling to a pluggable eviction policy

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Decides what to drop when a new key arrives at a full cache.
///
/// Hooks run while the cache holds its own lock, so implementations only
/// need interior mutability for their bookkeeping.
pub trait EvictionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Free space in `entries`, which holds at least `capacity` items
    fn make_room(&self, entries: &mut HashMap<String, String>, capacity: usize);

    fn on_access(&self, _key: &str) {}

    fn on_insert(&self, _key: &str) {}

    fn on_remove(&self, _key: &str) {}

    fn on_clear(&self) {}
}

/// Drops every entry once the cache is full.
///
/// Only consulted for a new key. Re-inserting a key that is already cached
/// replaces its value in place, so a full cache is not cleared by a refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOnOverflow;

impl EvictionPolicy for ClearOnOverflow {
    fn name(&self) -> &'static str {
        "clear-on-overflow"
    }

    fn make_room(&self, entries: &mut HashMap<String, String>, capacity: usize) {
        if entries.len() >= capacity {
            log::debug!("Thumbnail cache full ({} entries), clearing", entries.len());
            entries.clear();
        }
    }
}

/// Drops the least recently used entries one at a time.
#[derive(Debug)]
pub struct LeastRecentlyUsed {
    order: Mutex<LruCache<String, ()>>,
}

impl LeastRecentlyUsed {
    pub fn new() -> Self {
        Self {
            order: Mutex::new(LruCache::unbounded()),
        }
    }
}

impl Default for LeastRecentlyUsed {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy for LeastRecentlyUsed {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn make_room(&self, entries: &mut HashMap<String, String>, capacity: usize) {
        let mut order = self.order.lock();
        while entries.len() >= capacity {
            match order.pop_lru() {
                Some((key, ())) => {
                    log::debug!("Evicting least recently used thumbnail: {}", key);
                    entries.remove(&key);
                }
                None => {
                    entries.clear();
                    break;
                }
            }
        }
    }

    fn on_access(&self, key: &str) {
        self.order.lock().promote(key);
    }

    fn on_insert(&self, key: &str) {
        self.order.lock().put(key.to_string(), ());
    }

    fn on_remove(&self, key: &str) {
        self.order.lock().pop(key);
    }

    fn on_clear(&self) {
        self.order.lock().clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
    pub policy: &'static str,
}

pub struct ThumbnailCache {
    entries: RwLock<HashMap<String, String>>,
    capacity: usize,
    policy: Box<dyn EvictionPolicy>,
}

impl ThumbnailCache {
    /// Cache with the default clear-on-overflow policy; capacity is at least 1
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, Box::new(ClearOnOverflow))
    }

    pub fn with_policy(capacity: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read();
        let value = entries.get(key).cloned();
        if value.is_some() {
            self.policy.on_access(key);
        }
        value
    }

    /// Store `value` under `key`.
    ///
    /// The capacity check and the eviction policy run only for a key not
    /// already present. An existing key has its value replaced without
    /// evicting anything, and the policy still sees it as freshly used.
    pub fn insert(&self, key: &str, value: String) {
        let mut entries = self.entries.write();
        if !entries.contains_key(key) && entries.len() >= self.capacity {
            let before = entries.len();
            self.policy.make_room(&mut entries, self.capacity);
            if entries.is_empty() && before > 0 {
                self.policy.on_clear();
            }
        }
        entries.insert(key.to_string(), value);
        self.policy.on_insert(key);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.policy.on_remove(key);
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.policy.on_clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            size: self.len(),
            policy: self.policy.name(),
        }
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("size", &self.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy.name())
            .finish()
    }
}
