//! Eventually-consistent storage double.
//!
//! Wraps the immediate [`MemoryBackend`] so that freshly written objects
//! stay invisible for a configurable number of existence probes,
//! simulating read-after-write lag. Probe counts are recorded for
//! poll-loop assertions.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

use probemap_core::error::Result;
use probemap_core::storage::{MemoryBackend, ObjectMeta, StorageBackend};

/// In-memory storage whose writes become visible only after a configurable
/// number of probes.
#[derive(Debug, Default)]
pub struct EventualBackend {
    inner: MemoryBackend,
    visibility_lag: u32,
    /// Remaining invisible probes per path.
    pending: Mutex<HashMap<String, u32>>,
    /// Existence probes observed per path.
    probes: Mutex<HashMap<String, u64>>,
    /// Writes observed per path.
    puts: Mutex<HashMap<String, u64>>,
}

impl EventualBackend {
    /// Creates a backend whose writes are visible immediately.
    #[must_use]
    pub fn immediate() -> Self {
        Self::with_visibility_lag(0)
    }

    /// Creates a backend whose writes stay invisible for `lag` existence
    /// probes.
    #[must_use]
    pub fn with_visibility_lag(lag: u32) -> Self {
        Self {
            visibility_lag: lag,
            ..Self::default()
        }
    }

    /// Creates a backend whose writes never become visible.
    #[must_use]
    pub fn never_visible() -> Self {
        Self::with_visibility_lag(u32::MAX)
    }

    /// Returns how many existence probes the given path has received.
    #[must_use]
    pub fn exists_probes(&self, path: &str) -> u64 {
        self.probes
            .lock()
            .expect("lock")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Returns how many times the given path has been written.
    #[must_use]
    pub fn put_count(&self, path: &str) -> u64 {
        self.puts
            .lock()
            .expect("lock")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Returns whether a probe should still see the path as absent, and
    /// consumes one pending probe if so.
    fn consume_pending_probe(&self, path: &str) -> bool {
        let mut pending = self.pending.lock().expect("lock");
        match pending.get_mut(path) {
            Some(remaining) if *remaining > 0 => {
                *remaining = remaining.saturating_sub(1);
                // never_visible stays pinned at the sentinel
                if self.visibility_lag == u32::MAX {
                    *remaining = u32::MAX;
                }
                true
            }
            _ => false,
        }
    }

    fn is_pending(&self, path: &str) -> bool {
        self.pending
            .lock()
            .expect("lock")
            .get(path)
            .is_some_and(|remaining| *remaining > 0)
    }
}

#[async_trait]
impl StorageBackend for EventualBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        if self.is_pending(path) {
            return Err(probemap_core::Error::NotFound(format!(
                "object not found: {path}"
            )));
        }
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        *self
            .puts
            .lock()
            .expect("lock")
            .entry(path.to_string())
            .or_insert(0) += 1;
        self.inner.put(path, data).await?;
        if self.visibility_lag > 0 {
            self.pending
                .lock()
                .expect("lock")
                .insert(path.to_string(), self.visibility_lag);
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        *self
            .probes
            .lock()
            .expect("lock")
            .entry(path.to_string())
            .or_insert(0) += 1;
        if self.consume_pending_probe(path) {
            return Ok(false);
        }
        self.inner.exists(path).await
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        if self.is_pending(path) {
            return Ok(None);
        }
        self.inner.head(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let metas = self.inner.list(prefix).await?;
        Ok(metas
            .into_iter()
            .filter(|meta| !self.is_pending(&meta.path))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lagged_object_appears_after_the_configured_probes() {
        let backend = EventualBackend::with_visibility_lag(2);
        backend.put("doc.json", Bytes::from("{}")).await.expect("put");

        assert!(!backend.exists("doc.json").await.expect("probe 1"));
        assert!(!backend.exists("doc.json").await.expect("probe 2"));
        assert!(backend.exists("doc.json").await.expect("probe 3"));
        assert_eq!(backend.exists_probes("doc.json"), 3);
    }

    #[tokio::test]
    async fn pending_object_is_hidden_from_all_reads() {
        let backend = EventualBackend::with_visibility_lag(1);
        backend.put("dir/doc.json", Bytes::from("{}")).await.expect("put");

        assert!(backend.get("dir/doc.json").await.is_err());
        assert!(backend.head("dir/doc.json").await.expect("head").is_none());
        assert!(backend.list("dir/").await.expect("list").is_empty());

        assert!(!backend.exists("dir/doc.json").await.expect("probe"));
        assert!(backend.exists("dir/doc.json").await.expect("probe"));
        assert!(backend.get("dir/doc.json").await.is_ok());
        assert_eq!(backend.list("dir/").await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn never_visible_object_stays_hidden() {
        let backend = EventualBackend::never_visible();
        backend.put("doc.json", Bytes::from("{}")).await.expect("put");

        for _ in 0..100 {
            assert!(!backend.exists("doc.json").await.expect("probe"));
        }
    }

    #[tokio::test]
    async fn immediate_backend_behaves_like_memory() {
        let backend = EventualBackend::immediate();
        backend.put("doc.json", Bytes::from("{}")).await.expect("put");

        assert!(backend.exists("doc.json").await.expect("probe"));
        assert_eq!(backend.put_count("doc.json"), 1);
    }
}
