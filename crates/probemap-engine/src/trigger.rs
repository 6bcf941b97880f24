//! Computation trigger: submit the conversion job over an exact, ordered
//! artifact set.
//!
//! The attachment order is part of the platform contract: raw recordings
//! first, then processed recordings, then the single most-recent
//! supporting imaging artifact, then the manifest. The trigger does not
//! wait for the computation to finish; success means the platform
//! accepted the job.

use std::sync::Arc;
use tracing::debug;

use probemap_core::compute::{AttachedArtifact, Computation, ComputePlatform, PublishedArtifact};
use probemap_core::directory::RecordingArtifact;
use probemap_core::error::{Error, Result};

/// Fire-and-forget launcher for the conversion computation.
#[derive(Clone)]
pub struct ConversionTrigger {
    compute: Arc<dyn ComputePlatform>,
}

impl ConversionTrigger {
    /// Creates a trigger over the given compute platform.
    #[must_use]
    pub fn new(compute: Arc<dyn ComputePlatform>) -> Self {
        Self { compute }
    }

    /// Submits the conversion computation.
    ///
    /// `support` must be time-sorted (the catalog guarantees this); its
    /// last element is the most-recent supporting artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyArtifactSet`] when `support` is empty: there
    /// is no "most recent of nothing", and a partially-specified job must
    /// not be submitted. Platform failures propagate.
    pub async fn launch(
        &self,
        raw: &[RecordingArtifact],
        processed: &[RecordingArtifact],
        support: &[RecordingArtifact],
        manifest: &PublishedArtifact,
        template_id: &str,
    ) -> Result<Computation> {
        let latest_support = support.last().ok_or(Error::EmptyArtifactSet {
            role: "supporting imaging artifact",
        })?;

        let mut attachments = Vec::with_capacity(raw.len() + processed.len() + 2);
        attachments.extend(raw.iter().map(Self::attach));
        attachments.extend(processed.iter().map(Self::attach));
        attachments.push(Self::attach(latest_support));
        attachments.push(AttachedArtifact {
            id: manifest.id,
            mount: manifest.name.clone(),
        });

        debug!(
            template = template_id,
            attachments = attachments.len(),
            "running data converter computation"
        );
        self.compute.run_computation(template_id, attachments).await
    }

    fn attach(artifact: &RecordingArtifact) -> AttachedArtifact {
        AttachedArtifact {
            id: artifact.id,
            mount: artifact.name.clone(),
        }
    }
}

impl std::fmt::Debug for ConversionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionTrigger").finish_non_exhaustive()
    }
}
