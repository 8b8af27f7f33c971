//! Memo tables for the aggregate listing and per-title ratings.
//!
//! The pipeline only consumes a get/set contract ([`MemoStore`]). Two typed
//! tables sit on top of it so the fixed aggregate key and rating URLs never share
//! a namespace:
//!
//! - [`ListingMemo`]: the whole aggregate under one fixed key
//! - [`RatingMemo`]: one [`Rating`] per detail-page URL, sentinel included
//!
//! [`MemoryStore`] is the in-process implementation, with an optional TTL.

use crate::{Cinema, Rating};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key under which the aggregate listing is memoized.
pub const ALL_CINEMAS_KEY: &str = "allCinemas";

/// Key/value memo boundary.
///
/// Whatever was `set` is returned unchanged by `get` until the store decides to
/// forget it. Implementations must tolerate concurrent callers.
#[async_trait]
pub trait MemoStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Look up `key`.
    async fn get(&self, key: &str) -> Option<V>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: V);
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory [`MemoStore`] with an optional time-to-live.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    ttl: Option<Duration>,
}

impl<V> MemoryStore<V> {
    /// Store whose entries never expire.
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    /// Store whose entries read as absent once `ttl` has elapsed.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> MemoStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {},
            }
        }

        // Expired: evict under the write lock unless someone refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            tracing::debug!(key, "memo entry expired");
        }
        None
    }

    async fn set(&self, key: &str, value: V) {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
    }
}

/// Shared aggregate listing.
pub type Listing = Arc<Vec<Cinema>>;

/// Memo table holding the aggregate listing under [`ALL_CINEMAS_KEY`].
#[derive(Clone)]
pub struct ListingMemo {
    store: Arc<dyn MemoStore<Listing>>,
}

impl ListingMemo {
    /// Wrap a store.
    pub fn new(store: Arc<dyn MemoStore<Listing>>) -> Self {
        Self { store }
    }

    /// In-memory table with the given lifetime.
    pub fn in_memory(ttl: Option<Duration>) -> Self {
        Self::new(Arc::new(MemoryStore::with_ttl(ttl)))
    }

    /// Cached aggregate, if any.
    pub async fn get(&self) -> Option<Listing> {
        self.store.get(ALL_CINEMAS_KEY).await
    }

    /// Replace the cached aggregate.
    pub async fn set(&self, listing: Listing) {
        self.store.set(ALL_CINEMAS_KEY, listing).await;
    }
}

/// Memo table mapping detail-page URLs to ratings.
#[derive(Clone)]
pub struct RatingMemo {
    store: Arc<dyn MemoStore<Rating>>,
}

impl RatingMemo {
    /// Wrap a store.
    pub fn new(store: Arc<dyn MemoStore<Rating>>) -> Self {
        Self { store }
    }

    /// In-memory table with the given lifetime.
    pub fn in_memory(ttl: Option<Duration>) -> Self {
        Self::new(Arc::new(MemoryStore::with_ttl(ttl)))
    }

    /// Cached rating for `url`; a stored sentinel counts as a hit.
    pub async fn get(&self, url: &str) -> Option<Rating> {
        self.store.get(url).await
    }

    /// Remember the rating for `url`.
    pub async fn set(&self, url: &str, rating: Rating) {
        self.store.set(url, rating).await;
    }
}
