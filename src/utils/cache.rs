//! Query-level result caching.
//!
//! A fan-out search is expensive (several upstream calls, scoring, ranking),
//! so fully ranked result sets are cached per query signature and pagination
//! is served from the cached set. The signature covers everything that
//! changes the ranked order; page and page size are deliberately excluded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use crate::models::{RankedBatch, SearchRequest, SortBy};

/// Result of a cache lookup
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Compute the cache signature for a request.
///
/// Two requests that differ only in `page` or `page_size` share a signature
/// and therefore paginate over the same ranked set.
pub fn query_signature(request: &SearchRequest) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}",
        request.query.trim().to_lowercase(),
        request
            .date_range
            .from_year
            .map(|y| y.to_string())
            .unwrap_or_default(),
        request
            .date_range
            .to_year
            .map(|y| y.to_string())
            .unwrap_or_default(),
        match request.sort {
            SortBy::Relevance => "relevance",
            SortBy::Date => "date",
        },
        request.profile.as_deref().unwrap_or_default(),
    );

    let digest = md5::compute(input.as_bytes());
    format!("{:x}", digest)
}

/// Storage for ranked result sets, keyed by query signature
pub trait QueryCache: Send + Sync + std::fmt::Debug {
    /// Look up a ranked set by signature
    fn get(&self, signature: &str) -> CacheResult<RankedBatch>;

    /// Store a ranked set under a signature
    fn set(&self, signature: &str, batch: &RankedBatch);

    /// Drop one entry, if present
    fn expire(&self, signature: &str);

    /// Remove all expired entries, returning how many were dropped
    fn purge_expired(&self) -> usize;

    /// Current cache statistics
    fn stats(&self) -> CacheStats;
}

/// Statistics about the cache
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of live entries
    pub entries: usize,

    /// Lookups answered from cache
    pub hits: u64,

    /// Lookups that missed or had expired
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    expires_at: u64,
    batch: RankedBatch,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// In-memory TTL cache
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl_seconds: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_seconds,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl QueryCache for MemoryCache {
    fn get(&self, signature: &str) -> CacheResult<RankedBatch> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => return CacheResult::Miss,
        };

        match entries.get(signature) {
            Some(entry) if now_secs() >= entry.expires_at => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("cache expired for query: {}", signature);
                CacheResult::Expired
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("cache HIT for query: {}", signature);
                CacheResult::Hit(entry.batch.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("cache MISS for query: {}", signature);
                CacheResult::Miss
            }
        }
    }

    fn set(&self, signature: &str, batch: &RankedBatch) {
        let entry = CacheEntry {
            expires_at: now_secs() + self.ttl_seconds,
            batch: batch.clone(),
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(signature.to_string(), entry);
            tracing::debug!("cached ranked results: {}", signature);
        }
    }

    fn expire(&self, signature: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(signature);
        }
    }

    fn purge_expired(&self) -> usize {
        let now = now_secs();
        if let Ok(mut entries) = self.entries.write() {
            let before = entries.len();
            entries.retain(|_, entry| now < entry.expires_at);
            before - entries.len()
        } else {
            0
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache that stores nothing, for deployments that disable caching
#[derive(Debug, Default)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn get(&self, _signature: &str) -> CacheResult<RankedBatch> {
        CacheResult::Miss
    }

    fn set(&self, _signature: &str, _batch: &RankedBatch) {}

    fn expire(&self, _signature: &str) {}

    fn purge_expired(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
