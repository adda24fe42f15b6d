// src/llm/cache.rs
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::Suggestion;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Milliseconds since the Unix epoch
    timestamp: i64,
    suggestions: Vec<Suggestion>,
}

/// TTL cache for generated suggestions, keyed by content hash.
///
/// Entries live in memory and, when a directory is configured, as one JSON
/// file per key so they survive across runs. Read and write failures on
/// disk are logged and otherwise ignored.
#[derive(Debug)]
pub struct SuggestionCache {
    ttl: Duration,
    dir: Option<PathBuf>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::in_memory(DEFAULT_TTL)
    }
}

impl SuggestionCache {
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            ttl,
            dir: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_dir(ttl: Duration, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::in_memory(ttl)
        }
    }

    /// SHA-256 of `kind:text`, hex encoded.
    pub fn key(kind: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<Suggestion>> {
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(entry) = self.lock().get(key) {
            if self.is_fresh(entry, now) {
                debug!("Suggestion cache hit (memory) for {}", &key[..12.min(key.len())]);
                return Some(entry.suggestions.clone());
            }
        }

        let entry = self.read_file(key)?;
        if !self.is_fresh(&entry, now) {
            debug!("Cached suggestions for {} expired", &key[..12.min(key.len())]);
            return None;
        }
        let suggestions = entry.suggestions.clone();
        self.lock().insert(key.to_string(), entry);
        Some(suggestions)
    }

    pub fn put(&self, key: &str, suggestions: &[Suggestion]) {
        let entry = CacheEntry {
            timestamp: chrono::Utc::now().timestamp_millis(),
            suggestions: suggestions.to_vec(),
        };
        self.write_file(key, &entry);
        self.lock().insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        let age = now.saturating_sub(entry.timestamp);
        age >= 0 && (age as u128) < self.ttl.as_millis()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{key}.json"))
    }

    fn read_file(&self, key: &str) -> Option<CacheEntry> {
        let path = Self::entry_path(self.dir.as_deref()?, key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cache read error for {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_file(&self, key: &str, entry: &CacheEntry) {
        let Some(dir) = self.dir.as_deref() else {
            return;
        };
        let result = fs::create_dir_all(dir).and_then(|_| {
            let json = serde_json::to_string(entry).map_err(std::io::Error::other)?;
            fs::write(Self::entry_path(dir, key), json)
        });
        if let Err(e) = result {
            warn!("Cache write error in {}: {}", dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Impact;

    fn sample() -> Vec<Suggestion> {
        vec![Suggestion::generated("Pack the struct.", 0.8, Impact::High)]
    }

    #[test]
    fn test_key_is_stable_hex_sha256() {
        let key = SuggestionCache::key("optimization", "function f() {}");

        assert_eq!(key.len(), 64);
        assert_eq!(key, SuggestionCache::key("optimization", "function f() {}"));
        assert_ne!(key, SuggestionCache::key("review", "function f() {}"));
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_in_memory_round_trip() {
        let cache = SuggestionCache::default();
        let key = SuggestionCache::key("optimization", "a");

        assert!(cache.get(&key).is_none());
        cache.put(&key, &sample());

        assert_eq!(cache.get(&key), Some(sample()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = SuggestionCache::in_memory(Duration::ZERO);
        cache.put("k", &sample());

        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_entries_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = SuggestionCache::key("optimization", "b");

        SuggestionCache::with_dir(DEFAULT_TTL, dir.path()).put(&key, &sample());
        let reopened = SuggestionCache::with_dir(DEFAULT_TTL, dir.path());

        assert!(dir.path().join(format!("{key}.json")).is_file());
        assert_eq!(reopened.get(&key), Some(sample()));
    }

    #[test]
    fn test_expired_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let stale = CacheEntry {
            timestamp: chrono::Utc::now().timestamp_millis() - 25 * 60 * 60 * 1000,
            suggestions: sample(),
        };
        fs::write(
            dir.path().join("old.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let cache = SuggestionCache::with_dir(DEFAULT_TTL, dir.path());

        assert!(cache.get("old").is_none());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let cache = SuggestionCache::with_dir(DEFAULT_TTL, dir.path());

        assert!(cache.get("bad").is_none());
    }
}
