//! In-memory directory-service double with failure injection.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use probemap_core::directory::{DirectoryService, Experiment, RecordingArtifact};
use probemap_core::error::{Error, Result};

/// In-memory [`DirectoryService`] for tests.
///
/// Experiments are registered per subject, processed artifacts per
/// experiment; individual processed listings can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    experiments: Mutex<HashMap<String, Vec<Experiment>>>,
    processed: Mutex<HashMap<String, Vec<RecordingArtifact>>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an experiment under a subject.
    pub fn insert_experiment(&self, subject_id: &str, experiment: Experiment) {
        self.experiments
            .lock()
            .expect("lock")
            .entry(subject_id.to_string())
            .or_default()
            .push(experiment);
    }

    /// Registers the processed artifacts of an experiment.
    pub fn insert_processed(&self, experiment_id: &str, artifacts: Vec<RecordingArtifact>) {
        self.processed
            .lock()
            .expect("lock")
            .entry(experiment_id.to_string())
            .or_default()
            .extend(artifacts);
    }

    /// Makes the processed listing of an experiment fail.
    pub fn fail_processed_listing(&self, experiment_id: &str) {
        self.failing
            .lock()
            .expect("lock")
            .insert(experiment_id.to_string());
    }
}

#[async_trait]
impl DirectoryService for MemoryDirectory {
    async fn list_experiments(&self, subject_id: &str) -> Result<Vec<Experiment>> {
        Ok(self
            .experiments
            .lock()
            .expect("lock")
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_processed_artifacts(
        &self,
        experiment_id: &str,
    ) -> Result<Vec<RecordingArtifact>> {
        if self.failing.lock().expect("lock").contains(experiment_id) {
            return Err(Error::Internal {
                message: format!("injected failure for experiment: {experiment_id}"),
            });
        }
        Ok(self
            .processed
            .lock()
            .expect("lock")
            .get(experiment_id)
            .cloned()
            .unwrap_or_default())
    }
}
