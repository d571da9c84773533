//! Disk-backed cache, one JSON file per key.
//!
//! # Layout
//! ```text
//! <directory>/<hex sha256(key)>.json
//!     { "key": ..., "value": ..., "created_at": <epoch secs>, "ttl_seconds": <secs> }
//! ```
//!
//! # Design Decisions
//! - No in-memory index: every call reads the file, so entries survive restarts
//! - A single async mutex serializes all file operations of one instance;
//!   disk cache access is not latency-critical
//! - Every IO/decode failure is logged and degrades to a miss (reads) or a
//!   dropped write (writes); nothing here returns an error to the caller
//! - Creation time is wall-clock (`SystemTime`) so it stays meaningful
//!   across processes

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::cache::key::file_name_for;
use crate::cache::CacheStats;
use crate::config::schema::PersistentCacheConfig;
use crate::observability::metrics;

const EXTENSION: &str = "json";

/// Failures inside the persistent cache. Never leaves this module.
#[derive(Debug, Error)]
enum PersistError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The on-disk record.
#[derive(Debug, Serialize, Deserialize)]
struct Record<V> {
    key: String,
    value: V,
    created_at: f64,
    ttl_seconds: f64,
}

/// Record fields needed to judge freshness, without decoding the value.
#[derive(Debug, Deserialize)]
struct RecordHeader {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    created_at: f64,
    ttl_seconds: Option<f64>,
}

/// Summary of one file, as reported by [`PersistentCache::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub file: String,
    pub key: Option<String>,
    pub age_secs: f64,
    pub ttl_seconds: f64,
    pub expired: bool,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn is_expired(created_at: f64, ttl_seconds: f64, now: f64) -> bool {
    ttl_seconds > 0.0 && now - created_at > ttl_seconds
}

/// Disk-based cache for long-lived results.
#[derive(Debug)]
pub struct PersistentCache {
    directory: PathBuf,
    default_ttl: Duration,
    lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PersistentCache {
    /// Open (creating if needed) a cache rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>, default_ttl: Duration) -> io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        tracing::debug!(directory = %directory.display(), "Persistent cache opened");
        Ok(Self {
            directory,
            default_ttl,
            lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Open the cache described by its config section.
    pub fn from_config(config: &PersistentCacheConfig) -> io::Result<Self> {
        Self::open(
            &config.directory,
            Duration::from_secs(config.default_ttl_secs),
        )
    }

    /// Directory holding the cache files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// TTL applied by `set`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(file_name_for(key))
    }

    /// Read `key`. Missing, expired, unreadable or undecodable entries are misses.
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let path = self.path_for(key);
        let _guard = self.lock.lock().await;

        let found = match self.read_fresh::<V>(key, &path).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, error = %e, "Error reading persistent cache");
                None
            }
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_hit("persistent");
                tracing::debug!(key, "Persistent cache hit");
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_miss("persistent");
                None
            }
        }
    }

    async fn read_fresh<V: DeserializeOwned>(
        &self,
        key: &str,
        path: &Path,
    ) -> Result<Option<V>, PersistError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: Record<V> = serde_json::from_slice(&bytes)?;

        if is_expired(record.created_at, record.ttl_seconds, now_secs()) {
            tracing::debug!(key, "Persistent cache expired");
            remove_if_present(path).await?;
            return Ok(None);
        }
        Ok(Some(record.value))
    }

    /// Store `value` under `key` with the default TTL.
    pub async fn set<V: Serialize>(&self, key: &str, value: &V) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Store `value` under `key`; a zero TTL never expires. Best effort.
    pub async fn set_with_ttl<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) {
        let record = Record {
            key: key.to_string(),
            value,
            created_at: now_secs(),
            ttl_seconds: ttl.as_secs_f64(),
        };
        let bytes = match serde_json::to_vec_pretty(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "Error encoding persistent cache entry");
                return;
            }
        };

        let path = self.path_for(key);
        let _guard = self.lock.lock().await;
        match fs::write(&path, bytes).await {
            Ok(()) => tracing::debug!(key, "Persistent cache set"),
            Err(e) => tracing::warn!(key, error = %e, "Error writing persistent cache"),
        }
    }

    /// Remove `key` if present.
    pub async fn delete(&self, key: &str) {
        let path = self.path_for(key);
        let _guard = self.lock.lock().await;
        match remove_if_present(&path).await {
            Ok(true) => tracing::debug!(key, "Persistent cache delete"),
            Ok(false) => {}
            Err(e) => tracing::warn!(key, error = %e, "Error deleting persistent cache"),
        }
    }

    /// Remove every cache file and reset counters. Returns files removed.
    pub async fn clear(&self) -> usize {
        let _guard = self.lock.lock().await;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);

        let files = match self.cache_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Error clearing persistent cache");
                return 0;
            }
        };
        let mut removed = 0;
        for file in files {
            match remove_if_present(&file).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(file = %file.display(), error = %e, "Error removing cache file"),
            }
        }
        tracing::info!(removed, "Persistent cache cleared");
        removed
    }

    /// Remove every file whose `created_at + ttl_seconds` has passed.
    ///
    /// Unreadable files are skipped with a warning. Returns files removed.
    pub async fn cleanup_expired(&self) -> usize {
        let _guard = self.lock.lock().await;
        let files = match self.cache_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Error cleaning up persistent cache");
                return 0;
            }
        };

        let now = now_secs();
        let mut removed = 0;
        for file in files {
            let header = match read_header(&file).await {
                Ok(header) => header,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "Error checking cache file");
                    continue;
                }
            };
            let ttl = header.ttl_seconds.unwrap_or(self.default_ttl.as_secs_f64());
            if is_expired(header.created_at, ttl, now) {
                match remove_if_present(&file).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(file = %file.display(), error = %e, "Error removing cache file"),
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired persistent cache entries");
        }
        removed
    }

    /// Describe every cache file without decoding values.
    pub async fn inspect(&self) -> Vec<EntryInfo> {
        let _guard = self.lock.lock().await;
        let files = match self.cache_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Error listing persistent cache");
                return Vec::new();
            }
        };

        let now = now_secs();
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_header(&file).await {
                Ok(header) => {
                    let ttl = header.ttl_seconds.unwrap_or(self.default_ttl.as_secs_f64());
                    entries.push(EntryInfo {
                        file: name,
                        key: header.key,
                        age_secs: (now - header.created_at).max(0.0),
                        ttl_seconds: ttl,
                        expired: is_expired(header.created_at, ttl, now),
                    });
                }
                Err(e) => tracing::warn!(file = %name, error = %e, "Skipping unreadable cache file"),
            }
        }
        entries
    }

    /// Size is the number of cache files; the disk cache has no capacity.
    pub async fn stats(&self) -> CacheStats {
        let _guard = self.lock.lock().await;
        let size = match self.cache_files().await {
            Ok(files) => files.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Error listing persistent cache");
                0
            }
        };
        CacheStats::new(
            size,
            None,
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    async fn cache_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut dir = fs::read_dir(&self.directory).await?;
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

async fn read_header(path: &Path) -> Result<RecordHeader, PersistError> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open(dir: &tempfile::TempDir) -> PersistentCache {
        PersistentCache::open(dir.path(), Duration::from_secs(3600)).unwrap()
    }

    /// Write a record as if it had been stored `age_secs` ago.
    fn write_aged(cache: &PersistentCache, key: &str, value: serde_json::Value, age_secs: f64, ttl: f64) {
        let record = json!({
            "key": key,
            "value": value,
            "created_at": now_secs() - age_secs,
            "ttl_seconds": ttl,
        });
        std::fs::write(cache.path_for(key), serde_json::to_vec(&record).unwrap()).unwrap();
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Analysis {
        archetype: String,
        win_rate: f64,
        cards: Vec<String>,
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        let analysis = Analysis {
            archetype: "Mono-Red Aggro".into(),
            win_rate: 0.56,
            cards: vec!["Lightning Bolt".into(), "Monastery Swiftspear".into()],
        };

        cache.set("deck:abc", &analysis).await;
        let loaded: Option<Analysis> = cache.get("deck:abc").await;
        assert_eq!(loaded, Some(analysis));
    }

    #[tokio::test]
    async fn test_on_disk_format() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        cache
            .set_with_ttl("meta:standard", &vec![1, 2, 3], Duration::from_secs(90))
            .await;

        let path = cache.path_for("meta:standard");
        assert_eq!(path.file_name().unwrap().to_string_lossy(), file_name_for("meta:standard"));
        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["key"], "meta:standard");
        assert_eq!(raw["value"], json!([1, 2, 3]));
        assert_eq!(raw["ttl_seconds"], 90.0);
        assert!(raw["created_at"].as_f64().unwrap() > 1.6e9);
    }

    #[tokio::test]
    async fn test_missing_key_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        assert_eq!(cache.get::<String>("nope").await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        write_aged(&cache, "old", json!("stale"), 120.0, 60.0);
        write_aged(&cache, "fresh", json!("ok"), 30.0, 60.0);

        assert_eq!(cache.get::<String>("old").await, None);
        assert!(!cache.path_for("old").exists());
        assert_eq!(cache.get::<String>("fresh").await.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        write_aged(&cache, "forever", json!(1), 10.0 * 365.0 * 86_400.0, 0.0);
        assert_eq!(cache.get::<u32>("forever").await, Some(1));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        std::fs::write(cache.path_for("broken"), b"{ not json").unwrap();
        assert_eq!(cache.get::<String>("broken").await, None);

        // Value of the wrong shape is also just a miss.
        cache.set("typed", &"a string").await;
        assert_eq!(cache.get::<Vec<u32>>("typed").await, None);
    }

    #[tokio::test]
    async fn test_delete_clear_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        cache.set("a", &1).await;
        cache.set("b", &2).await;
        write_aged(&cache, "expired", json!(3), 500.0, 100.0);
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        cache.delete("a").await;
        cache.delete("a").await;
        assert_eq!(cache.get::<u32>("a").await, None);

        assert_eq!(cache.cleanup_expired().await, 1);
        assert_eq!(cache.stats().await.size, 1);

        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.stats().await.size, 0);
        // Only cache files are touched.
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        open(&dir).set("card:Opt", &"Scry 1. Draw a card.").await;
        let reopened = open(&dir);
        assert_eq!(
            reopened.get::<String>("card:Opt").await.as_deref(),
            Some("Scry 1. Draw a card.")
        );
    }

    #[tokio::test]
    async fn test_inspect_reports_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(&dir);
        write_aged(&cache, "stale", json!(null), 50.0, 10.0);
        cache.set("live", &true).await;

        let entries = cache.inspect().await;
        assert_eq!(entries.len(), 2);
        let stale = entries.iter().find(|e| e.key.as_deref() == Some("stale")).unwrap();
        assert!(stale.expired);
        let live = entries.iter().find(|e| e.key.as_deref() == Some("live")).unwrap();
        assert!(!live.expired);
    }
}
