// Per-namespace TTL cache backing metadata, translation and token storage.
//
// A namespace is one logical table with a single ttl policy. Namespaces are
// created per (data-kind, language), so cache pollution across languages is
// structurally impossible. Entries are reclaimed lazily on read or eagerly
// by `expire` (the admin maintenance sweep). No LRU: callers only need
// keyed get/set/expire/clear.

use dashmap::DashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    written_at: Instant,
}

pub struct TtlCache<V> {
    name: String,
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    /// On-disk location a previous process run may have spilled to.
    /// `clear` wipes it; stale state across restarts is never trusted.
    spill_dir: Option<PathBuf>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            ttl,
            spill_dir: None,
        }
    }

    pub fn with_spill_dir(name: impl Into<String>, ttl: Duration, dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            ttl,
            spill_dir: Some(dir),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a value, overwriting any prior entry and resetting its age.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                written_at: Instant::now(),
            },
        );
    }

    /// Return the value if present and unexpired. Expired entries are
    /// removed on the way out so the table does not grow unbounded.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.written_at.elapsed() <= self.ttl {
                tracing::debug!(namespace = %self.name, key, "cache hit");
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        tracing::debug!(namespace = %self.name, key, "cache miss");
        None
    }

    /// Remove every entry unconditionally and wipe the on-disk spill
    /// location from a prior run. Called once per namespace at startup.
    pub fn clear(&self) {
        self.entries.clear();
        if let Some(ref dir) = self.spill_dir {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    tracing::warn!(namespace = %self.name, "failed to wipe spill dir: {}", e);
                }
            }
        }
    }

    /// Eager sweep of expired entries. Returns how many were removed.
    pub fn expire(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.written_at.elapsed() <= self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_set_returns_value() {
        let cache: TtlCache<String> = TtlCache::new("meta/it-IT", Duration::from_secs(60));
        cache.set("tt0111161", "value".to_string());
        assert_eq!(cache.get("tt0111161"), Some("value".to_string()));
    }

    #[test]
    fn test_get_unknown_key_returns_none() {
        let cache: TtlCache<String> = TtlCache::new("meta/it-IT", Duration::from_secs(60));
        assert_eq!(cache.get("tt0000000"), None);
    }

    #[test]
    fn test_get_after_ttl_returns_none() {
        let cache: TtlCache<String> = TtlCache::new("meta/it-IT", Duration::from_millis(1));
        cache.set("tt0111161", "value".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("tt0111161"), None);
        // Reclaimed lazily on read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_refreshes_age() {
        let cache: TtlCache<String> = TtlCache::new("meta/it-IT", Duration::from_millis(50));
        cache.set("k", "old".to_string());
        std::thread::sleep(Duration::from_millis(30));
        cache.set("k", "new".to_string());
        std::thread::sleep(Duration::from_millis(30));
        // 60ms since first write, 30ms since the refresh
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    #[test]
    fn test_expire_sweeps_only_stale_entries() {
        let cache: TtlCache<i32> = TtlCache::new("meta/it-IT", Duration::from_millis(20));
        cache.set("stale", 1);
        std::thread::sleep(Duration::from_millis(30));
        cache.set("fresh", 2);
        let removed = cache.expire();
        assert_eq!(removed, 1);
        assert_eq!(cache.get("fresh"), Some(2));
        assert_eq!(cache.get("stale"), None);
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache: TtlCache<i32> = TtlCache::new("meta/it-IT", Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
