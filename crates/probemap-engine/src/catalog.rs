//! Artifact catalog: discovery and classification of a subject's recording
//! artifacts.
//!
//! All listing operations return collections sorted ascending by creation
//! time, ties broken by arrival order; "most recent" is always the last
//! element. Missing data (an experiment without a raw artifact, a failed
//! per-experiment fetch) is logged and excluded; the catalog keeps
//! producing partial results rather than aborting on a single gap.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use probemap_core::directory::{DirectoryService, Platform, RecordingArtifact};
use probemap_core::error::{Error, Result};

/// Read-side view over the external directory service.
#[derive(Clone)]
pub struct ArtifactCatalog {
    directory: Arc<dyn DirectoryService>,
}

impl ArtifactCatalog {
    /// Creates a catalog over the given directory service.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    /// Sorts a collection ascending by creation time.
    ///
    /// The sort is stable, so artifacts with equal timestamps keep their
    /// arrival order.
    #[must_use]
    pub fn sort_by_created(mut artifacts: Vec<RecordingArtifact>) -> Vec<RecordingArtifact> {
        artifacts.sort_by_key(|artifact| artifact.created_at);
        artifacts
    }

    /// Lists the raw recording artifacts of a subject's experiments on the
    /// given platform, sorted by creation time.
    ///
    /// Experiments whose raw data has not been uploaded are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub async fn recording_artifacts(
        &self,
        subject_id: &str,
        platform: &Platform,
    ) -> Result<Vec<RecordingArtifact>> {
        let experiments = self.directory.list_experiments(subject_id).await?;

        let mut artifacts = Vec::new();
        for experiment in experiments
            .into_iter()
            .filter(|experiment| &experiment.platform == platform)
        {
            match experiment.raw_artifact {
                Some(artifact) => {
                    debug!(
                        experiment = %experiment.id,
                        artifact = %artifact.name,
                        "using raw recording artifact"
                    );
                    artifacts.push(artifact);
                }
                None => {
                    warn!(
                        experiment = %experiment.id,
                        "raw data has not been uploaded: cannot use for annotation"
                    );
                }
            }
        }
        Ok(Self::sort_by_created(artifacts))
    }

    /// Lists every successfully processed ("sorted") artifact across a
    /// subject's ecephys experiments, sorted by creation time.
    ///
    /// One fetch task runs per experiment, fan-out/fan-in with no
    /// cross-task ordering dependency. A failed or empty fetch is logged
    /// and its experiment excluded from the aggregate; it never cancels the
    /// other tasks. Error-state outcomes are excluded.
    ///
    /// # Errors
    ///
    /// Propagates the initial experiment listing failure; per-experiment
    /// fetch failures are tolerated.
    pub async fn processed_artifacts(&self, subject_id: &str) -> Result<Vec<RecordingArtifact>> {
        let experiments = self.directory.list_experiments(subject_id).await?;

        let mut tasks = JoinSet::new();
        for experiment in experiments
            .into_iter()
            .filter(|experiment| experiment.platform == Platform::Ecephys)
        {
            let directory = Arc::clone(&self.directory);
            tasks.spawn(async move {
                let result = directory.list_processed_artifacts(&experiment.id).await;
                (experiment.id, result)
            });
        }

        let mut aggregated = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (experiment_id, result) = joined.map_err(|e| Error::Internal {
                message: format!("processed-artifact fetch task failed: {e}"),
            })?;
            match result {
                Ok(artifacts) => {
                    let usable: Vec<RecordingArtifact> = artifacts
                        .into_iter()
                        .filter(|artifact| !artifact.is_error_state)
                        .collect();
                    if usable.is_empty() {
                        warn!(
                            experiment = %experiment_id,
                            "no sorted data in a non-errored state: cannot use for annotation"
                        );
                        continue;
                    }
                    aggregated.extend(usable);
                }
                Err(error) => {
                    warn!(
                        experiment = %experiment_id,
                        %error,
                        "listing sorted data failed: excluding experiment"
                    );
                }
            }
        }
        Ok(Self::sort_by_created(aggregated))
    }

    /// Restricts a collection to the requested names.
    ///
    /// An empty name set returns the collection unchanged. A requested name
    /// with no matching artifact is logged and otherwise ignored.
    #[must_use]
    pub fn filter_by_name(
        artifacts: Vec<RecordingArtifact>,
        names: &[String],
    ) -> Vec<RecordingArtifact> {
        if names.is_empty() {
            return artifacts;
        }
        let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
        let filtered: Vec<RecordingArtifact> = artifacts
            .into_iter()
            .filter(|artifact| requested.contains(artifact.name.as_str()))
            .collect();
        for name in names {
            if !filtered.iter().any(|artifact| &artifact.name == name) {
                warn!(name = %name, "requested sorted data artifact not found");
            }
        }
        filtered
    }
}

impl std::fmt::Debug for ArtifactCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCatalog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use probemap_core::id::ArtifactId;
    use probemap_test_utils::directory::MemoryDirectory;
    use probemap_test_utils::fixtures::{experiment, recording_artifact};

    fn catalog(directory: MemoryDirectory) -> ArtifactCatalog {
        ArtifactCatalog::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn recording_artifacts_skip_missing_raw_data() {
        let directory = MemoryDirectory::new();
        directory.insert_experiment(
            "123456",
            experiment("exp-1", Platform::Ecephys, Some(recording_artifact("rec-1", 2))),
        );
        directory.insert_experiment(
            "123456",
            experiment("exp-2", Platform::Ecephys, None),
        );
        directory.insert_experiment(
            "123456",
            experiment("exp-3", Platform::Ecephys, Some(recording_artifact("rec-3", 1))),
        );

        let artifacts = catalog(directory)
            .recording_artifacts("123456", &Platform::Ecephys)
            .await
            .expect("list");

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["rec-3", "rec-1"], "sorted by creation time");
    }

    #[tokio::test]
    async fn recording_artifacts_filter_by_platform() {
        let directory = MemoryDirectory::new();
        directory.insert_experiment(
            "123456",
            experiment("imaging", Platform::SmartSpim, Some(recording_artifact("spim", 1))),
        );
        directory.insert_experiment(
            "123456",
            experiment("ephys", Platform::Ecephys, Some(recording_artifact("rec", 2))),
        );

        let artifacts = catalog(directory)
            .recording_artifacts("123456", &Platform::SmartSpim)
            .await
            .expect("list");

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "spim");
    }

    #[tokio::test]
    async fn processed_artifacts_exclude_error_states() {
        let directory = MemoryDirectory::new();
        directory.insert_experiment("123456", experiment("exp-1", Platform::Ecephys, None));
        directory.insert_processed(
            "exp-1",
            vec![
                recording_artifact("sorted-ok", 1),
                {
                    let mut artifact = recording_artifact("sorted-bad", 2);
                    artifact.is_error_state = true;
                    artifact
                },
            ],
        );

        let artifacts = catalog(directory)
            .processed_artifacts("123456")
            .await
            .expect("list");

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "sorted-ok");
    }

    #[tokio::test]
    async fn processed_artifacts_survive_one_failing_experiment() {
        let directory = MemoryDirectory::new();
        for (id, at) in [("exp-1", 3), ("exp-2", 1), ("exp-3", 2)] {
            directory.insert_experiment("123456", experiment(id, Platform::Ecephys, None));
            directory.insert_processed(id, vec![recording_artifact(&format!("sorted-{id}"), at)]);
        }
        directory.fail_processed_listing("exp-2");

        let artifacts = catalog(directory)
            .processed_artifacts("123456")
            .await
            .expect("list");

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["sorted-exp-3", "sorted-exp-1"],
            "failed experiment excluded, remainder sorted by creation time"
        );
    }

    #[tokio::test]
    async fn processed_artifacts_keep_repeated_names_across_experiments() {
        let directory = MemoryDirectory::new();
        for id in ["exp-1", "exp-2"] {
            directory.insert_experiment("123456", experiment(id, Platform::Ecephys, None));
            directory.insert_processed(id, vec![recording_artifact("sorted-shared", 1)]);
        }

        let artifacts = catalog(directory)
            .processed_artifacts("123456")
            .await
            .expect("list");

        assert_eq!(artifacts.len(), 2, "no deduplication across experiments");
    }

    #[tokio::test]
    async fn processed_artifacts_ignore_non_ecephys_experiments() {
        let directory = MemoryDirectory::new();
        directory.insert_experiment("123456", experiment("imaging", Platform::SmartSpim, None));
        directory.insert_processed("imaging", vec![recording_artifact("spim-out", 1)]);

        let artifacts = catalog(directory)
            .processed_artifacts("123456")
            .await
            .expect("list");

        assert!(artifacts.is_empty());
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mk = |name: &str| RecordingArtifact {
            id: ArtifactId::generate(),
            name: name.to_string(),
            created_at: at,
            is_error_state: false,
            is_analyzer_variant: false,
        };
        let sorted = ArtifactCatalog::sort_by_created(vec![mk("first"), mk("second")]);
        let names: Vec<&str> = sorted.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"], "arrival order preserved");
    }

    #[test]
    fn filter_by_name_restricts_and_tolerates_unknown_names() {
        let artifacts = vec![
            recording_artifact("keep-me", 1),
            recording_artifact("drop-me", 2),
        ];
        let filtered = ArtifactCatalog::filter_by_name(
            artifacts,
            &["keep-me".to_string(), "missing".to_string()],
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "keep-me");
    }

    #[test]
    fn filter_by_name_with_empty_set_is_identity() {
        let artifacts = vec![recording_artifact("a", 1), recording_artifact("b", 2)];
        let filtered = ArtifactCatalog::filter_by_name(artifacts.clone(), &[]);
        assert_eq!(filtered, artifacts);
    }
}
