//! Two-tier lookup cache for destination metadata and admin rosters.
//!
//! Reads go to the in-process tier first, then to the shared tier kept in
//! the database. A shared hit is copied back into the local tier for the
//! time it has left. Writes go to both. Every entry lives for the same
//! fixed TTL and nothing is invalidated on write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use herald_platform::ChatInfo;
use herald_shared::ChatId;
use herald_store::StoreError;

use crate::auth::Roster;
use crate::store::Store;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Shared cache unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Cache value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cache is closed")]
    Closed,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// A hit, with the time it has left to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub value: String,
    pub ttl_left: Duration,
}

/// One storage level of the cache.
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedValue>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Drop expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> CacheResult<usize>;
}

// ---------------------------------------------------------------------------
// Local tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LocalEntry {
    value: String,
    deadline: Instant,
}

/// Bounded in-process tier.
pub struct LocalTier {
    entries: RwLock<HashMap<String, LocalEntry>>,
    capacity: usize,
}

impl LocalTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheTier for LocalTier {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedValue>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.deadline > now)
            .map(|entry| CachedValue {
                value: entry.value.clone(),
                ttl_left: entry.deadline - now,
            }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if entries.len() >= self.capacity && !entries.contains_key(key) {
            entries.retain(|_, entry| entry.deadline > now);
            if entries.len() >= self.capacity {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.deadline)
                    .map(|(k, _)| k.clone());
                if let Some(k) = soonest {
                    entries.remove(&k);
                }
            }
        }

        entries.insert(
            key.to_string(),
            LocalEntry {
                value: value.to_string(),
                deadline: now + ttl,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.deadline > now);
        Ok(before - entries.len())
    }
}

// ---------------------------------------------------------------------------
// Shared tier
// ---------------------------------------------------------------------------

/// Tier backed by the `cache_entries` table, visible to every process that
/// opens the same database.
///
/// Expiry is stored as wall-clock time. The clock is anchored to the wall
/// clock when the tier is built and then advanced by the runtime clock.
pub struct SharedTier {
    store: Store,
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl SharedTier {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            anchor_wall: Utc::now(),
            anchor: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

#[async_trait]
impl CacheTier for SharedTier {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedValue>> {
        let now = self.now();
        let row = self.store.cache_get(key.to_string(), now).await?;
        Ok(row.map(|row| CachedValue {
            ttl_left: (row.expires_at - now).to_std().unwrap_or_default(),
            value: row.value,
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        self.store
            .cache_set(key.to_string(), value.to_string(), self.now() + ttl)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        Ok(self.store.cache_purge_expired(self.now()).await?)
    }
}

// ---------------------------------------------------------------------------
// Tiered cache
// ---------------------------------------------------------------------------

pub struct TieredCache {
    local: Arc<dyn CacheTier>,
    shared: Arc<dyn CacheTier>,
    ttl: Duration,
    open: AtomicBool,
}

impl TieredCache {
    /// Open the standard local-over-database cache.
    pub fn open(store: Store, ttl: Duration, local_capacity: usize) -> Self {
        Self::with_tiers(
            Arc::new(LocalTier::new(local_capacity)),
            Arc::new(SharedTier::new(store)),
            ttl,
        )
    }

    pub fn with_tiers(local: Arc<dyn CacheTier>, shared: Arc<dyn CacheTier>, ttl: Duration) -> Self {
        debug!(ttl_secs = ttl.as_secs(), "Lookup cache opened");
        Self {
            local,
            shared,
            ttl,
            open: AtomicBool::new(true),
        }
    }

    /// Stop serving. Later calls fail with [`CacheError::Closed`].
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Lookup cache closed");
        }
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Closed)
        }
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;

        if let Some(hit) = self.local.get(key).await? {
            return Ok(Some(hit.value));
        }

        match self.shared.get(key).await? {
            Some(hit) => {
                self.local.set(key, &hit.value, hit.ttl_left).await?;
                Ok(Some(hit.value))
            }
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.ensure_open()?;
        self.local.set(key, value, self.ttl).await?;
        self.shared.set(key, value, self.ttl).await
    }

    pub async fn purge_expired(&self) -> CacheResult<usize> {
        self.ensure_open()?;
        let removed = self.local.purge_expired().await? + self.shared.purge_expired().await?;
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }

    // -- Typed entries --

    pub async fn chat_info(&self, chat: ChatId) -> CacheResult<Option<ChatInfo>> {
        self.get_json(&chat_key(chat)).await
    }

    pub async fn put_chat_info(&self, info: &ChatInfo) -> CacheResult<()> {
        self.set_json(&chat_key(info.id), info).await
    }

    pub async fn roster(&self, chat: ChatId) -> CacheResult<Option<Roster>> {
        self.get_json(&roster_key(chat)).await
    }

    pub async fn put_roster(&self, chat: ChatId, roster: &Roster) -> CacheResult<()> {
        self.set_json(&roster_key(chat), roster).await
    }
}

fn chat_key(chat: ChatId) -> String {
    format!("chat:{chat}")
}

fn roster_key(chat: ChatId) -> String {
    format!("admins:{chat}")
}
