//! Snapshot cache for market data.
//!
//! Keeps at most one full-market snapshot per market, each fresh for a fixed
//! TTL after it was fetched. Entries beyond the configured capacity are
//! evicted least-recently-used first.

use lru::LruCache;
use pulse_common::CacheConfig;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::provider::{ProviderError, SnapshotSource};
use super::{Market, Snapshot};

/// Cache entry with fetch time
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Arc<Snapshot>,
    fetched_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Market snapshot cache.
///
/// The lock covers lookups and stores only; it is released while the source
/// fetches, so two concurrent misses on one market may both fetch. The later
/// store wins.
pub struct SnapshotCache {
    source: Arc<dyn SnapshotSource>,
    entries: Mutex<LruCache<Market, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SnapshotCache {
    /// Create a cache in front of `source`.
    pub fn new(source: Arc<dyn SnapshotSource>, config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            source,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the live snapshot for `market`, fetching it on a miss.
    pub async fn get_or_fetch(&self, market: Market) -> Result<Arc<Snapshot>, ProviderError> {
        if let Some(snapshot) = self.lookup(market) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(snapshot);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let snapshot = Arc::new(self.source.fetch_snapshot(market).await?);
        debug!(
            source = self.source.name(),
            market = %market,
            rows = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched market snapshot"
        );

        self.store(market, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Live entry for `market`, marking it recently used. Expired entries are dropped.
    fn lookup(&self, market: Market) -> Option<Arc<Snapshot>> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Snapshot cache lock poisoned, bypassing cache");
                return None;
            }
        };

        let expired = match entries.get(&market) {
            Some(entry) if !entry.is_expired(self.ttl) => return Some(Arc::clone(&entry.snapshot)),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&market);
            debug!(market = %market, "Snapshot expired");
        }
        None
    }

    fn store(&self, market: Market, snapshot: Arc<Snapshot>) {
        let entry = CacheEntry {
            snapshot,
            fetched_at: Instant::now(),
        };

        if let Ok(mut entries) = self.entries.lock() {
            if let Some((evicted, _)) = entries.push(market, entry) {
                if evicted != market {
                    info!(market = %evicted, "Evicted least recently used snapshot");
                }
            }
        }
    }

    /// Drop every cached snapshot.
    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (total, expired) = self
            .entries
            .lock()
            .map(|entries| {
                let total = entries.len();
                let expired = entries
                    .iter()
                    .filter(|(_, entry)| entry.is_expired(self.ttl))
                    .count();
                (total, expired)
            })
            .unwrap_or((0, 0));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

// ============================================================================
// Tests
// ============================================================================
