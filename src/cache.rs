//! Forecast cache: a best-effort, read-through TTL layer over a key-value store

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::task;

use crate::clock::Clock;

/// Raw key-value storage with opaque values
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Remove every entry whose envelope expired at or before `now_millis`,
    /// returning how many were removed
    async fn purge_expired(&self, now_millis: i64) -> Result<usize>;
}

// Expiry leads the envelope so a sweep can read it without knowing `T`
#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    expires_at: i64, // Unix timestamp (milliseconds)
    value: T,
}

#[derive(Deserialize)]
struct StoredHeader {
    expires_at: i64,
}

/// Unreadable envelopes count as expired
fn is_expired(bytes: &[u8], now_millis: i64) -> bool {
    postcard::take_from_bytes::<StoredHeader>(bytes).map_or(true, |(header, _)| header.expires_at <= now_millis)
}

/// On-disk store backed by an embedded fjall keyspace
pub struct PersistentStore {
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn purge_store(store: Keyspace, now_millis: i64) -> Result<usize> {
    let mut expired = Vec::new();
    for guard in store.iter() {
        let (key, value) = guard.into_inner()?;
        if is_expired(&value, now_millis) {
            expired.push(key);
        }
    }
    for key in &expired {
        store.remove(key.clone())?;
    }
    Ok(expired.len())
}

impl PersistentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("forecasts", fjall::KeyspaceCreateOptions::default)?;
        Ok(PersistentStore { store: items })
    }
}

#[async_trait]
impl CacheStore for PersistentStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || get_from_store(store, key)).await?
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.insert(key, value)).await??;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }

    async fn purge_expired(&self, now_millis: i64) -> Result<usize> {
        let store = self.store.clone();
        task::spawn_blocking(move || purge_store(store, now_millis)).await?
    }
}

/// Process-local store, used when no cache directory is configured and in tests
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now_millis: i64) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, bytes| !is_expired(bytes, now_millis));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

/// TTL cache for computed forecasts.
///
/// Every operation is best-effort: storage and serialization failures are
/// logged and reported as a miss, never returned to the caller. Writes also
/// sweep expired entries from the whole store, at most once per TTL.
pub struct ForecastCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    last_sweep_millis: AtomicI64,
}

impl ForecastCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            last_sweep_millis: AtomicI64::new(i64::MIN),
        }
    }

    /// Returns the cached value if present and not expired.
    /// Expired entries are deleted on access.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Forecast cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stores a value, replacing any existing entry for the key
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_set(key, value).await {
            tracing::warn!(key, error = %e, "Forecast cache write failed");
        }
        self.sweep_if_due().await;
    }

    /// Delete every expired entry now
    #[tracing::instrument(name = "sweep_cache", level = "debug", skip(self))]
    pub async fn sweep(&self) {
        let now = self.clock.now().timestamp_millis();
        self.last_sweep_millis.store(now, Ordering::Relaxed);
        match self.store.purge_expired(now).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Swept expired forecasts"),
            Err(e) => tracing::warn!(error = %e, "Forecast cache sweep failed"),
        }
    }

    async fn sweep_if_due(&self) {
        let now = self.clock.now().timestamp_millis();
        let last = self.last_sweep_millis.load(Ordering::Relaxed);
        if now.saturating_sub(last) >= self.ttl.num_milliseconds() {
            self.sweep().await;
        }
    }

    async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key).await? else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
        let now = self.clock.now().timestamp_millis();

        if now < entry.expires_at {
            tracing::debug!("Key found and still fresh");
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.store.delete(key).await?;
            Ok(None)
        }
    }

    async fn try_set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let expires_at = (self.clock.now() + self.ttl).timestamp_millis();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;
        self.store.set(key, bytes).await
    }
}
