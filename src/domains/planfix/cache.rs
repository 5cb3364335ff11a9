//! Request cache with per-entry TTL.
//!
//! Providers store serialized JSON strings with an absolute expiry in
//! milliseconds. Expiry is checked lazily when an entry is read. The typed
//! [`RequestCache`] wrapper treats undecodable entries as misses.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::error::CacheError;
use crate::core::config::{CacheBackend, CacheConfig};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expiry(ttl_seconds: Option<u64>) -> Option<i64> {
    ttl_seconds.map(|ttl| now_ms().saturating_add((ttl as i64).saturating_mul(1000)))
}

fn is_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_some_and(|at| at <= now_ms())
}

/// Key/value storage behind the request cache.
///
/// Implementations must be safe for concurrent use on independent keys.
pub trait CacheProvider: Send + Sync {
    /// Stored payload, or `None` when missing or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a payload; `None` TTL means no expiry.
    fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>);

    /// Remove every key starting with `prefix`.
    fn delete_prefix(&self, prefix: &str);

    /// Remove everything.
    fn clear(&self);
}

// ============================================================================
// In-memory provider
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<i64>,
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheProvider for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries();
        let entry = entries.get(key)?;
        if is_expired(entry.expires_at) {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) {
        self.entries().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: expiry(ttl_seconds),
            },
        );
    }

    fn delete_prefix(&self, prefix: &str) {
        self.entries().retain(|key, _| !key.starts_with(prefix));
    }

    fn clear(&self) {
        self.entries().clear();
    }
}

// ============================================================================
// SQLite provider
// ============================================================================

/// Cache persisted in a SQLite file.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (and create if needed) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS request_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn();
        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM request_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((_, expires_at)) if is_expired(expires_at) => {
                conn.execute("DELETE FROM request_cache WHERE key = ?1", params![key])?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }
}

impl CacheProvider for SqliteCache {
    fn get(&self, key: &str) -> Option<String> {
        self.try_get(key).unwrap_or_else(|e| {
            warn!("[cache] SQLite read failed for {}: {}", key, e);
            None
        })
    }

    fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) {
        let result = self.conn().execute(
            "INSERT OR REPLACE INTO request_cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expiry(ttl_seconds)],
        );
        if let Err(e) = result {
            warn!("[cache] SQLite write failed for {}: {}", key, e);
        }
    }

    fn delete_prefix(&self, prefix: &str) {
        let result = self.conn().execute(
            "DELETE FROM request_cache WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        );
        if let Err(e) = result {
            warn!("[cache] SQLite delete failed for prefix {}: {}", prefix, e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.conn().execute("DELETE FROM request_cache", []) {
            warn!("[cache] SQLite clear failed: {}", e);
        }
    }
}

// ============================================================================
// Typed wrapper
// ============================================================================

/// Typed front of a [`CacheProvider`]; a disabled cache misses every read.
#[derive(Clone, Default)]
pub struct RequestCache {
    provider: Option<Arc<dyn CacheProvider>>,
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("enabled", &self.provider.is_some())
            .finish()
    }
}

impl RequestCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn disabled() -> Self {
        Self { provider: None }
    }

    /// Build the configured provider, falling back to memory when the
    /// SQLite database cannot be opened.
    pub fn from_config(config: &CacheConfig) -> Self {
        match config.backend {
            CacheBackend::None => {
                info!("[cache] Request cache disabled");
                Self::disabled()
            }
            CacheBackend::Memory => Self::memory(),
            CacheBackend::Sqlite => match SqliteCache::open(&config.sqlite_path) {
                Ok(cache) => {
                    info!("[cache] Using SQLite cache at {:?}", config.sqlite_path);
                    Self::new(Arc::new(cache))
                }
                Err(e) => {
                    warn!(
                        "[cache] Cannot open SQLite cache at {:?}: {}; using memory cache",
                        config.sqlite_path, e
                    );
                    Self::memory()
                }
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.provider.as_ref()?.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("[cache] Hit {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("[cache] Ignoring malformed entry {}: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) {
        let Some(provider) = &self.provider else {
            return;
        };
        match serde_json::to_string(value) {
            Ok(raw) => provider.set(key, raw, ttl_seconds),
            Err(e) => warn!("[cache] Cannot serialize entry {}: {}", key, e),
        }
    }

    /// [`get`](Self::get) on the blocking pool, for use from async code.
    ///
    /// Providers may touch disk (SQLite), which must not stall a runtime
    /// worker.
    pub async fn get_async<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if !self.is_enabled() {
            return None;
        }
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.get::<T>(&key))
            .await
            .unwrap_or_else(|e| {
                warn!("[cache] Lookup task failed: {}", e);
                None
            })
    }

    /// [`set`](Self::set) on the blocking pool.
    pub async fn set_async<T>(&self, key: &str, value: T, ttl_seconds: Option<u64>)
    where
        T: Serialize + Send + 'static,
    {
        if !self.is_enabled() {
            return;
        }
        let cache = self.clone();
        let key = key.to_string();
        if let Err(e) =
            tokio::task::spawn_blocking(move || cache.set(&key, &value, ttl_seconds)).await
        {
            warn!("[cache] Store task failed: {}", e);
        }
    }

    pub fn delete_prefix(&self, prefix: &str) {
        if let Some(provider) = &self.provider {
            provider.delete_prefix(prefix);
        }
    }

    pub fn clear(&self) {
        if let Some(provider) = &self.provider {
            provider.clear();
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

/// JSON text with object keys sorted at every level.
///
/// `serde_json::to_string` only sorts while `preserve_order` is off, and any
/// crate in the build can turn that feature on, so keys are sorted here.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        Value::String(key.clone()),
                        canonical_json(&map[key.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Cache key for a request: SHA-256 of the canonical `{path, method, body}`.
pub fn cache_key(path: &str, method: &str, body: Option<&Value>) -> String {
    let payload = serde_json::json!({
        "path": path,
        "method": method,
        "body": body.cloned().unwrap_or(Value::Null),
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&payload).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn providers() -> Vec<Arc<dyn CacheProvider>> {
        vec![
            Arc::new(MemoryCache::new()),
            Arc::new(SqliteCache::open_in_memory().unwrap()),
        ]
    }

    #[test]
    fn test_set_and_get() {
        for provider in providers() {
            let cache = RequestCache::new(provider);
            cache.set("k", &json!({"a": 1}), Some(60));
            assert_eq!(cache.get::<Value>("k"), Some(json!({"a": 1})));
            assert_eq!(cache.get::<Value>("missing"), None);
        }
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        for provider in providers() {
            provider.set("old", "1".to_string(), Some(0));
            assert_eq!(provider.get("old"), None);
            provider.set("fresh", "2".to_string(), None);
            assert_eq!(provider.get("fresh").as_deref(), Some("2"));
        }
    }

    #[test]
    fn test_malformed_payload_is_a_miss() {
        for provider in providers() {
            provider.set("bad", "{not json".to_string(), None);
            let cache = RequestCache::new(provider);
            assert_eq!(cache.get::<Value>("bad"), None);
        }
    }

    #[tokio::test]
    async fn test_async_access_runs_sqlite_off_the_runtime() {
        let dir = TempDir::new().unwrap();
        let cache = RequestCache::new(Arc::new(
            SqliteCache::open(&dir.path().join("cache.db")).unwrap(),
        ));
        cache.set_async("k", json!({"a": [1, 2]}), Some(60)).await;
        assert_eq!(cache.get_async::<Value>("k").await, Some(json!({"a": [1, 2]})));
        assert_eq!(cache.get_async::<Value>("missing").await, None);

        let disabled = RequestCache::disabled();
        disabled.set_async("k", json!(1), None).await;
        assert_eq!(disabled.get_async::<Value>("k").await, None);
    }

    #[test]
    fn test_wrong_type_is_a_miss() {
        let cache = RequestCache::memory();
        cache.set("n", &json!("text"), None);
        assert_eq!(cache.get::<u64>("n"), None);
    }

    #[test]
    fn test_delete_prefix_and_clear() {
        for provider in providers() {
            provider.set("dir:1", "1".to_string(), None);
            provider.set("dir:2", "2".to_string(), None);
            provider.set("report:1", "3".to_string(), None);

            provider.delete_prefix("dir:");
            assert_eq!(provider.get("dir:1"), None);
            assert_eq!(provider.get("dir:2"), None);
            assert_eq!(provider.get("report:1").as_deref(), Some("3"));

            provider.clear();
            assert_eq!(provider.get("report:1"), None);
        }
    }

    #[test]
    fn test_sqlite_prefix_is_literal() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.set("a%b", "1".to_string(), None);
        cache.set("axb", "2".to_string(), None);
        cache.delete_prefix("a%");
        assert_eq!(cache.get("a%b"), None);
        assert_eq!(cache.get("axb").as_deref(), Some("2"));
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite");

        SqliteCache::open(&path)
            .unwrap()
            .set("k", "\"v\"".to_string(), Some(3600));
        let reopened = SqliteCache::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("\"v\""));
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = RequestCache::disabled();
        cache.set("k", &json!(1), None);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get::<Value>("k"), None);
    }

    #[test]
    fn test_cache_key_ignores_key_order() {
        let a = cache_key("task/list", "POST", Some(&json!({"offset": 0, "pageSize": 100})));
        let b = cache_key("task/list", "POST", Some(&json!({"pageSize": 100, "offset": 0})));
        let c = cache_key("task/list", "GET", Some(&json!({"offset": 0, "pageSize": 100})));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_canonical_json_nested() {
        let value = json!({"b": [ {"y": 1, "x": 2} ], "a": "s"});
        assert_eq!(canonical_json(&value), r#"{"a":"s","b":[{"x":2,"y":1}]}"#);
    }
}
