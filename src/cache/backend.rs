//! Cache backend implementations.

use crate::types::ResponsePayload;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Result<Option<ResponsePayload>>;
    async fn set(&self, fingerprint: &str, payload: &ResponsePayload) -> Result<()>;
    /// Persist pending writes. A no-op for purely in-memory backends.
    async fn flush(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory backend. Useful for tests and for callers that only want
/// within-process deduplication.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ResponsePayload>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<ResponsePayload>> {
        Ok(self.entries.read().unwrap().get(fingerprint).cloned())
    }

    async fn set(&self, fingerprint: &str, payload: &ResponsePayload) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(fingerprint.to_string(), payload.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// File-backed backend: the whole map is loaded at open and written back as a
/// JSON snapshot on flush (temp file + rename, so a crash mid-flush leaves the
/// previous snapshot intact).
pub struct FileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, ResponsePayload>>,
}

impl FileCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<ResponsePayload>> {
        Ok(self.entries.read().unwrap().get(fingerprint).cloned())
    }

    async fn set(&self, fingerprint: &str, payload: &ResponsePayload) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(fingerprint.to_string(), payload.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let serialized = {
            let entries = self.entries.read().unwrap();
            serde_json::to_string(&*entries)?
        };
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("fp").await.unwrap().is_none());
        cache
            .set("fp", &ResponsePayload::json(json!({"ok": true})))
            .await
            .unwrap();
        let hit = cache.get("fp").await.unwrap().unwrap();
        assert_eq!(hit.as_json().unwrap()["ok"], true);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.json");

        let cache = FileCache::open(&path).unwrap();
        cache
            .set("fp", &ResponsePayload::text("cached"))
            .await
            .unwrap();
        cache.flush().await.unwrap();

        let reopened = FileCache::open(&path).unwrap();
        let hit = reopened.get("fp").await.unwrap().unwrap();
        assert_eq!(hit.as_text(), Some("cached"));
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = MemoryCache::new();
        cache.set("fp", &ResponsePayload::text("first")).await.unwrap();
        cache.set("fp", &ResponsePayload::text("second")).await.unwrap();
        assert_eq!(
            cache.get("fp").await.unwrap().unwrap().as_text(),
            Some("second")
        );
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
