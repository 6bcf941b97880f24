//! Remote compute-platform contract: artifact registration and computation
//! triggering.
//!
//! Mirrors the platform's client surface as an abstract trait so the engine
//! can be composed with a real client or an in-memory double. The engine
//! never waits for a computation to finish; success means the platform
//! accepted the job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::id::{ArtifactId, ComputationId};
use crate::uri::StorageUri;

/// Readiness lifecycle of a registered artifact.
///
/// `Pending` → `Registering` → `Ready`; only `Ready` artifacts are safe to
/// reference in a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Uploaded bytes exist in durable storage but the platform record is
    /// not yet created.
    Pending,
    /// The platform metadata record exists but availability is unconfirmed.
    Registering,
    /// The platform confirms the artifact is available.
    Ready,
    /// Registration failed terminally.
    Failed,
}

/// The object-store location backing a registered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSource {
    /// Bucket holding the object.
    pub bucket: String,
    /// Key prefix within the bucket, without leading or trailing separators.
    pub prefix: String,
}

impl ArtifactSource {
    /// Derives the source from a typed storage URI.
    #[must_use]
    pub fn from_uri(uri: &StorageUri) -> Self {
        Self {
            bucket: uri.bucket().to_string(),
            prefix: uri.key().to_string(),
        }
    }
}

/// Parameters for registering a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactParams {
    /// Artifact name.
    pub name: String,
    /// Mount point the artifact is attached under when referenced by a
    /// computation.
    pub mount: String,
    /// Discovery tags.
    pub tags: Vec<String>,
    /// Backing object-store location.
    pub source: ArtifactSource,
}

/// A registered remote artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    /// Platform-assigned identifier.
    pub id: ArtifactId,
    /// Artifact name.
    pub name: String,
    /// Backing object-store location.
    pub source: ArtifactSource,
    /// Current readiness state.
    pub ready_state: ReadyState,
    /// When the platform created the record; the "most recent" sort key.
    pub created_at: DateTime<Utc>,
}

/// One artifact reference in a computation's input set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedArtifact {
    /// Referenced artifact.
    pub id: ArtifactId,
    /// Mount point within the computation.
    pub mount: String,
}

/// Handle to a computation accepted for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Computation {
    /// Platform-assigned identifier.
    pub id: ComputationId,
    /// The computation template (capsule) that was launched.
    pub template_id: String,
    /// When the platform accepted the job.
    pub submitted_at: DateTime<Utc>,
}

/// External compute platform: artifact registry plus computation runner.
#[async_trait]
pub trait ComputePlatform: Send + Sync + 'static {
    /// Registers a new artifact over an existing stored object.
    async fn create_artifact(&self, params: ArtifactParams) -> Result<PublishedArtifact>;

    /// Blocks until the artifact is ready, bounded by `timeout`.
    ///
    /// Returns the refreshed artifact on success and
    /// [`Error::ReadinessTimeout`](crate::error::Error::ReadinessTimeout)
    /// when the bound is exceeded.
    async fn wait_until_ready(
        &self,
        artifact: &PublishedArtifact,
        timeout: Duration,
    ) -> Result<PublishedArtifact>;

    /// Returns all artifacts registered under the given name.
    ///
    /// An empty result is a normal outcome ("not yet created"), not an
    /// error. Ordering is unspecified; callers sort by `created_at`.
    async fn find_artifacts(&self, name: &str) -> Result<Vec<PublishedArtifact>>;

    /// Submits a computation over the given ordered artifact set.
    ///
    /// Fire-and-forget: returns as soon as the platform accepts the job.
    async fn run_computation(
        &self,
        template_id: &str,
        attachments: Vec<AttachedArtifact>,
    ) -> Result<Computation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_from_uri_strips_separators() {
        let uri = StorageUri::parse("s3://scratch-data/project/manifests/doc.csv").expect("uri");
        let source = ArtifactSource::from_uri(&uri);
        assert_eq!(source.bucket, "scratch-data");
        assert_eq!(source.prefix, "project/manifests/doc.csv");
    }

    #[test]
    fn source_from_bucket_root_has_empty_prefix() {
        let uri = StorageUri::parse("s3://bucket").expect("uri");
        let source = ArtifactSource::from_uri(&uri);
        assert_eq!(source.bucket, "bucket");
        assert_eq!(source.prefix, "");
    }

    #[test]
    fn ready_state_serializes_snake_case() {
        let json = serde_json::to_string(&ReadyState::Registering).expect("serialize");
        assert_eq!(json, "\"registering\"");
    }
}
