//! Cache manager: hit/miss accounting and failure isolation.

use super::backend::CacheBackend;
use crate::types::ResponsePayload;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Hit/miss/write counters, readable at any time for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// Wraps a [`CacheBackend`] so that cache faults never fail a request: a
/// backend error on read degrades to a miss, an error on write is logged and
/// dropped.
pub struct CacheManager {
    backend: Box<dyn CacheBackend>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheManager {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self {
            backend,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, fingerprint: &str) -> Option<ResponsePayload> {
        match self.backend.get(fingerprint).await {
            Ok(Some(payload)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint, backend = self.backend.name(), "cache hit");
                Some(payload)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(fingerprint, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, fingerprint: &str, payload: &ResponsePayload) {
        match self.backend.set(fingerprint, payload).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(fingerprint, error = %e, "cache write failed"),
        }
    }

    pub async fn flush(&self) {
        if let Err(e) = self.backend.flush().await {
            warn!(backend = self.backend.name(), error = %e, "cache flush failed");
        }
    }

    pub async fn len(&self) -> usize {
        self.backend.len().await.unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn counts_hits_and_misses() {
        let manager = CacheManager::new(Box::new(MemoryCache::new()));
        assert!(manager.get("fp").await.is_none());
        manager.put("fp", &ResponsePayload::text("x")).await;
        assert!(manager.get("fp").await.is_some());

        let stats = manager.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }
}
