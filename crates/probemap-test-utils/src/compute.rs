//! In-memory compute-platform double.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use probemap_core::compute::{
    ArtifactParams, AttachedArtifact, Computation, ComputePlatform, PublishedArtifact, ReadyState,
};
use probemap_core::error::{Error, Result};
use probemap_core::id::{ArtifactId, ComputationId};

/// A computation accepted by [`MemoryCompute`], with its full input set.
#[derive(Debug, Clone)]
pub struct SubmittedComputation {
    /// The returned handle.
    pub computation: Computation,
    /// The template that was launched.
    pub template_id: String,
    /// The ordered attachment list, as submitted.
    pub attachments: Vec<AttachedArtifact>,
}

/// In-memory [`ComputePlatform`] for tests.
///
/// Records every registered artifact and submitted computation. Readiness
/// can be stalled so readiness-timeout paths are testable.
#[derive(Debug, Default)]
pub struct MemoryCompute {
    artifacts: Mutex<Vec<PublishedArtifact>>,
    computations: Mutex<Vec<SubmittedComputation>>,
    stall_readiness: AtomicBool,
    find_calls: AtomicU64,
}

impl MemoryCompute {
    /// Creates an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a pre-existing artifact.
    pub fn insert_artifact(&self, artifact: PublishedArtifact) {
        self.artifacts.lock().expect("lock").push(artifact);
    }

    /// Makes every subsequent readiness wait time out.
    pub fn stall_readiness(&self) {
        self.stall_readiness.store(true, Ordering::SeqCst);
    }

    /// Returns all registered artifacts, in creation order.
    #[must_use]
    pub fn artifacts(&self) -> Vec<PublishedArtifact> {
        self.artifacts.lock().expect("lock").clone()
    }

    /// Returns all submitted computations, in submission order.
    #[must_use]
    pub fn computations(&self) -> Vec<SubmittedComputation> {
        self.computations.lock().expect("lock").clone()
    }

    /// Returns how many name lookups have hit the platform.
    #[must_use]
    pub fn find_calls(&self) -> u64 {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputePlatform for MemoryCompute {
    async fn create_artifact(&self, params: ArtifactParams) -> Result<PublishedArtifact> {
        let artifact = PublishedArtifact {
            id: ArtifactId::generate(),
            name: params.name,
            source: params.source,
            ready_state: ReadyState::Registering,
            created_at: Utc::now(),
        };
        self.artifacts.lock().expect("lock").push(artifact.clone());
        Ok(artifact)
    }

    async fn wait_until_ready(
        &self,
        artifact: &PublishedArtifact,
        timeout: Duration,
    ) -> Result<PublishedArtifact> {
        if self.stall_readiness.load(Ordering::SeqCst) {
            return Err(Error::ReadinessTimeout {
                name: artifact.name.clone(),
                timeout_secs: timeout.as_secs(),
            });
        }
        let mut artifacts = self.artifacts.lock().expect("lock");
        let stored = artifacts
            .iter_mut()
            .find(|candidate| candidate.id == artifact.id)
            .ok_or_else(|| Error::NotFound(format!("artifact not found: {}", artifact.id)))?;
        stored.ready_state = ReadyState::Ready;
        Ok(stored.clone())
    }

    async fn find_artifacts(&self, name: &str) -> Result<Vec<PublishedArtifact>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .artifacts
            .lock()
            .expect("lock")
            .iter()
            .filter(|artifact| artifact.name == name)
            .cloned()
            .collect())
    }

    async fn run_computation(
        &self,
        template_id: &str,
        attachments: Vec<AttachedArtifact>,
    ) -> Result<Computation> {
        let computation = Computation {
            id: ComputationId::generate(),
            template_id: template_id.to_string(),
            submitted_at: Utc::now(),
        };
        self.computations.lock().expect("lock").push(SubmittedComputation {
            computation: computation.clone(),
            template_id: template_id.to_string(),
            attachments,
        });
        Ok(computation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probemap_core::compute::ArtifactSource;

    fn params(name: &str) -> ArtifactParams {
        ArtifactParams {
            name: name.to_string(),
            mount: name.to_string(),
            tags: vec![],
            source: ArtifactSource {
                bucket: "bucket".to_string(),
                prefix: "prefix".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn created_artifacts_become_ready_on_wait() {
        let compute = MemoryCompute::new();
        let artifact = compute.create_artifact(params("doc")).await.expect("create");
        assert_eq!(artifact.ready_state, ReadyState::Registering);

        let ready = compute
            .wait_until_ready(&artifact, Duration::from_secs(60))
            .await
            .expect("ready");
        assert_eq!(ready.ready_state, ReadyState::Ready);
    }

    #[tokio::test]
    async fn stalled_readiness_times_out() {
        let compute = MemoryCompute::new();
        let artifact = compute.create_artifact(params("doc")).await.expect("create");
        compute.stall_readiness();

        let result = compute
            .wait_until_ready(&artifact, Duration::from_secs(60))
            .await;
        assert!(matches!(
            result,
            Err(Error::ReadinessTimeout {
                timeout_secs: 60,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn find_matches_exact_names_and_counts_calls() {
        let compute = MemoryCompute::new();
        compute.create_artifact(params("doc")).await.expect("create");
        compute.create_artifact(params("other")).await.expect("create");

        let found = compute.find_artifacts("doc").await.expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(compute.find_calls(), 1);
    }
}
