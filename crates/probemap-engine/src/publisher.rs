//! Remote artifact lifecycle: publish a document, wait for visibility,
//! register it, wait for readiness.
//!
//! Publishing is not considered complete until the written object is
//! externally visible (the durable store is only eventually consistent)
//! and the remote platform has confirmed the registered artifact ready.
//! Re-publishing under the same derived name is idempotent when the caller
//! sets `skip_existing`.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use probemap_core::cache::{Clock, SystemClock, TtlCache};
use probemap_core::compute::{ArtifactParams, ArtifactSource, ComputePlatform, PublishedArtifact};
use probemap_core::error::{Error, Result};
use probemap_core::storage::StorageBackend;
use probemap_core::uri::StorageUri;

/// Fixed interval between existence probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed bound on the readiness wait after registration.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time-to-live of the name-lookup cache.
pub const DEFAULT_LOOKUP_TTL: Duration = Duration::from_secs(1);

/// Polls until `path` is visible, bounded by `timeout`.
///
/// The first probe happens immediately; subsequent probes are spaced
/// `poll_interval` apart, with the final sleep clamped so the timeout is
/// not overshot.
///
/// # Errors
///
/// Returns [`Error::PublishTimeout`] when the object never becomes visible
/// within `timeout`; storage failures propagate as-is.
pub async fn wait_until_visible(
    storage: &dyn StorageBackend,
    path: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if storage.exists(path).await? {
            return Ok(());
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(Error::PublishTimeout {
                path: path.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Publishes documents as remote artifacts and looks them up by name.
pub struct ArtifactPublisher {
    storage: Arc<dyn StorageBackend>,
    compute: Arc<dyn ComputePlatform>,
    cache: TtlCache<Vec<PublishedArtifact>>,
    poll_interval: Duration,
    readiness_timeout: Duration,
}

impl ArtifactPublisher {
    /// Creates a publisher with the default poll, readiness, and cache
    /// settings.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, compute: Arc<dyn ComputePlatform>) -> Self {
        Self::with_settings(
            storage,
            compute,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_READINESS_TIMEOUT,
            DEFAULT_LOOKUP_TTL,
            Arc::new(SystemClock),
        )
    }

    /// Creates a publisher with explicit settings and an injected clock.
    #[must_use]
    pub fn with_settings(
        storage: Arc<dyn StorageBackend>,
        compute: Arc<dyn ComputePlatform>,
        poll_interval: Duration,
        readiness_timeout: Duration,
        lookup_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            compute,
            cache: TtlCache::new(lookup_ttl, clock),
            poll_interval,
            readiness_timeout,
        }
    }

    /// Publishes `document` at `destination` and registers it as a remote
    /// artifact named `artifact_name` (default: the destination stem).
    ///
    /// With `skip_existing`, an artifact already registered under the name
    /// is returned unchanged and nothing is written; pass
    /// `skip_existing = false` to force a re-publish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishTimeout`] when the written object never
    /// becomes visible, [`Error::ReadinessTimeout`] when the platform never
    /// reports the artifact ready, and propagates storage and platform
    /// failures.
    pub async fn publish_and_register(
        &self,
        document: Bytes,
        destination: &StorageUri,
        artifact_name: Option<&str>,
        tags: Vec<String>,
        skip_existing: bool,
        timeout: Duration,
    ) -> Result<PublishedArtifact> {
        let name = match artifact_name {
            Some(name) => name.to_string(),
            None => destination
                .stem()
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "destination has no file name to derive an artifact name from: {destination}"
                    ))
                })?
                .to_string(),
        };

        if skip_existing {
            match self.lookup_by_name(&name).await {
                Ok(existing) => {
                    info!(
                        name = %name,
                        id = %existing.id,
                        "artifact already exists; pass skip_existing=false to force re-publish"
                    );
                    return Ok(existing);
                }
                Err(error) if error.is_not_found() => {}
                Err(error) => return Err(error),
            }
        }

        let path = destination.to_string();
        debug!(path = %path, "writing document");
        self.storage.put(&path, document).await?;
        wait_until_visible(self.storage.as_ref(), &path, timeout, self.poll_interval).await?;

        self.register_and_wait(destination, &name, tags).await
    }

    /// Registers an already-visible stored object as a remote artifact and
    /// blocks until the platform reports it ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadinessTimeout`] when the readiness bound is
    /// exceeded; platform failures propagate.
    pub async fn register_and_wait(
        &self,
        destination: &StorageUri,
        name: &str,
        tags: Vec<String>,
    ) -> Result<PublishedArtifact> {
        let params = ArtifactParams {
            name: name.to_string(),
            mount: name.to_string(),
            tags,
            source: ArtifactSource::from_uri(destination),
        };
        debug!(name = %params.name, "creating artifact");
        let artifact = self.compute.create_artifact(params).await?;

        debug!(name = %artifact.name, "waiting for new artifact to be ready");
        let ready = self
            .compute
            .wait_until_ready(&artifact, self.readiness_timeout)
            .await?;
        debug!(name = %ready.name, "artifact is ready");

        self.cache.invalidate(name);
        Ok(ready)
    }

    /// Returns the most-recently-created artifact registered under `name`.
    ///
    /// Lookups are cached for the configured TTL, so repeated calls within
    /// the interval do not re-query the platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no matching artifact exists yet:
    /// a recoverable condition, distinct from a transient platform failure.
    pub async fn lookup_by_name(&self, name: &str) -> Result<PublishedArtifact> {
        let mut candidates = match self.cache.get(name) {
            Some(cached) => cached,
            None => {
                let found = self.compute.find_artifacts(name).await?;
                self.cache.insert(name, found.clone());
                found
            }
        };

        if candidates.len() > 1 {
            debug!(name = %name, count = candidates.len(), "multiple artifacts found: using most-recent");
        }
        candidates.sort_by_key(|artifact| artifact.created_at);
        candidates
            .pop()
            .ok_or_else(|| Error::NotFound(format!("no artifact named {name} has been created yet")))
    }
}

impl std::fmt::Debug for ArtifactPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactPublisher")
            .field("poll_interval", &self.poll_interval)
            .field("readiness_timeout", &self.readiness_timeout)
            .finish_non_exhaustive()
    }
}
