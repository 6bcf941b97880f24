//! Composition root: the converter engine.
//!
//! A [`ConverterEngine`] is built for one subject from injected
//! collaborator handles (directory, storage, compute) plus an
//! [`EngineConfig`]. Everything the engine does is wiring of the other
//! modules: enumerate annotation documents, build the manifest, publish,
//! and trigger the conversion computation.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

use probemap_core::cache::{Clock, SystemClock};
use probemap_core::compute::{Computation, ComputePlatform, PublishedArtifact};
use probemap_core::directory::{DirectoryService, Platform, RecordingArtifact};
use probemap_core::error::{Error, Result};
use probemap_core::observability::{catalog_span, publish_span};
use probemap_core::paths::{DocumentKind, StorageLayout};
use probemap_core::storage::StorageBackend;
use probemap_core::uri::StorageUri;

use crate::catalog::ArtifactCatalog;
use crate::manifest::{self, ManifestRecord};
use crate::publisher::{
    ArtifactPublisher, DEFAULT_LOOKUP_TTL, DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT,
};
use crate::state::AnnotationState;
use crate::trigger::ConversionTrigger;

/// Default bound on the post-write visibility wait.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Storage root under which annotation documents and manifests live.
    pub storage_root: StorageUri,
    /// The computation template (capsule) the conversion runs on.
    pub template_id: String,
    /// Bound on the post-write visibility wait.
    pub publish_timeout: Duration,
    /// Interval between existence probes.
    pub poll_interval: Duration,
    /// Bound on the post-registration readiness wait.
    pub readiness_timeout: Duration,
    /// Time-to-live of the artifact name-lookup cache.
    pub lookup_ttl: Duration,
}

impl EngineConfig {
    /// Creates a config with the default timeouts.
    #[must_use]
    pub fn new(storage_root: StorageUri, template_id: impl Into<String>) -> Self {
        Self {
            storage_root,
            template_id: template_id.into(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            lookup_ttl: DEFAULT_LOOKUP_TTL,
        }
    }
}

/// Orchestrates the annotation-to-conversion pipeline for one subject.
pub struct ConverterEngine {
    subject_id: String,
    storage: Arc<dyn StorageBackend>,
    catalog: ArtifactCatalog,
    publisher: ArtifactPublisher,
    trigger: ConversionTrigger,
    layout: StorageLayout,
    config: EngineConfig,
}

impl ConverterEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        directory: Arc<dyn DirectoryService>,
        storage: Arc<dyn StorageBackend>,
        compute: Arc<dyn ComputePlatform>,
        config: EngineConfig,
    ) -> Self {
        Self::with_clock(subject_id, directory, storage, compute, config, Arc::new(SystemClock))
    }

    /// Creates an engine with an injected clock for the lookup cache.
    #[must_use]
    pub fn with_clock(
        subject_id: impl Into<String>,
        directory: Arc<dyn DirectoryService>,
        storage: Arc<dyn StorageBackend>,
        compute: Arc<dyn ComputePlatform>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let layout = StorageLayout::new(config.storage_root.clone());
        let publisher = ArtifactPublisher::with_settings(
            Arc::clone(&storage),
            Arc::clone(&compute),
            config.poll_interval,
            config.readiness_timeout,
            config.lookup_ttl,
            clock,
        );
        Self {
            subject_id: subject_id.into(),
            storage,
            catalog: ArtifactCatalog::new(directory),
            publisher,
            trigger: ConversionTrigger::new(compute),
            layout,
            config,
        }
    }

    /// Returns the subject this engine was built for.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the storage layout the engine persists under.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Returns the deterministic manifest artifact name for this subject.
    #[must_use]
    pub fn manifest_stem(&self) -> String {
        StorageLayout::document_stem(&self.subject_id, DocumentKind::ConverterManifest)
    }

    /// Lists this subject's persisted annotation documents, sorted by stem.
    ///
    /// The naming contract makes the lexical stem sort a write-time sort,
    /// so the last element is the most recent document.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn state_document_paths(&self) -> Result<Vec<StorageUri>> {
        let prefix = format!("{}/", self.layout.states_dir());
        let needle = format!("_{}_", self.subject_id);
        let metas = self.storage.list(&prefix).await?;

        let mut paths = Vec::new();
        for meta in metas {
            if meta.path.ends_with(".json") && meta.path.contains(&needle) {
                paths.push(StorageUri::parse(&meta.path)?);
            }
        }
        paths.sort_by(|a, b| a.stem().cmp(&b.stem()));
        Ok(paths)
    }

    /// Loads the most recent persisted annotation document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no document has been persisted for
    /// this subject.
    pub async fn latest_state(&self) -> Result<AnnotationState> {
        let paths = self.state_document_paths().await?;
        let Some(path) = paths.last() else {
            return Err(Error::NotFound(format!(
                "no annotation document found for {} in {}",
                self.subject_id,
                self.layout.states_dir()
            )));
        };
        debug!(path = %path, "using most-recent annotation document");
        AnnotationState::load(self.storage.as_ref(), path).await
    }

    /// Loads a persisted annotation document by stem.
    ///
    /// # Errors
    ///
    /// Propagates storage and parse failures.
    pub async fn load_state(&self, name: &str) -> Result<AnnotationState> {
        let path = self.layout.states_dir().join(&format!("{name}.json"));
        AnnotationState::load(self.storage.as_ref(), &path).await
    }

    /// Lists the subject's raw ecephys recording artifacts, time-sorted.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub async fn raw_recording_artifacts(&self) -> Result<Vec<RecordingArtifact>> {
        self.catalog
            .recording_artifacts(&self.subject_id, &Platform::Ecephys)
            .instrument(catalog_span("raw_recording_artifacts", &self.subject_id))
            .await
    }

    /// Lists the subject's processed recording artifacts, time-sorted.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub async fn processed_recording_artifacts(&self) -> Result<Vec<RecordingArtifact>> {
        self.catalog
            .processed_artifacts(&self.subject_id)
            .instrument(catalog_span("processed_artifacts", &self.subject_id))
            .await
    }

    /// Lists the subject's SmartSPIM imaging artifacts, time-sorted.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub async fn imaging_artifacts(&self) -> Result<Vec<RecordingArtifact>> {
        self.catalog
            .recording_artifacts(&self.subject_id, &Platform::SmartSpim)
            .instrument(catalog_span("imaging_artifacts", &self.subject_id))
            .await
    }

    /// Builds the manifest rows for this subject.
    ///
    /// Uses the most recent annotation document unless `state_name` names
    /// one explicitly. An empty `recording_names` means "all processed
    /// artifacts", name-sorted; a non-empty set restricts to those names,
    /// warning for names that match nothing.
    ///
    /// # Errors
    ///
    /// Propagates document-loading, identity, and directory failures.
    pub async fn build_manifest(
        &self,
        state_name: Option<&str>,
        recording_names: &[String],
    ) -> Result<Vec<ManifestRecord>> {
        let (stem, state) = match state_name {
            Some(name) => (name.to_string(), self.load_state(name).await?),
            None => {
                let paths = self.state_document_paths().await?;
                let Some(path) = paths.last() else {
                    return Err(Error::NotFound(format!(
                        "no annotation document found for {} in {}",
                        self.subject_id,
                        self.layout.states_dir()
                    )));
                };
                debug!(path = %path, "using most-recent annotation document");
                let stem = path.stem().unwrap_or_default().to_string();
                (stem, AnnotationState::load(self.storage.as_ref(), path).await?)
            }
        };

        let labels = state.annotation_labels();
        let processed = self.processed_recording_artifacts().await?;
        let names: Vec<String> = if recording_names.is_empty() {
            let mut names: Vec<String> =
                processed.into_iter().map(|artifact| artifact.name).collect();
            names.sort();
            names
        } else {
            ArtifactCatalog::filter_by_name(processed, recording_names)
                .into_iter()
                .map(|artifact| artifact.name)
                .collect()
        };

        Ok(manifest::build_rows(&labels, &names, &self.subject_id, &stem))
    }

    /// Persists an annotation document and registers it as a remote
    /// artifact.
    ///
    /// # Errors
    ///
    /// Propagates identity, visibility-timeout, and readiness failures.
    pub async fn publish_state(&self, state: &AnnotationState) -> Result<PublishedArtifact> {
        let path = state
            .persist(
                self.storage.as_ref(),
                &self.layout,
                None,
                self.config.publish_timeout,
                self.config.poll_interval,
            )
            .await?;
        let name = path
            .stem()
            .ok_or_else(|| Error::Internal {
                message: format!("generated state path has no stem: {path}"),
            })?
            .to_string();
        let tags = vec![
            "neuroglancer".to_string(),
            "ecephys".to_string(),
            "annotation".to_string(),
            self.subject_id.clone(),
        ];
        self.publisher
            .register_and_wait(&path, &name, tags)
            .instrument(publish_span("publish_state", &name))
            .await
    }

    /// Publishes the manifest rows as a remote artifact.
    ///
    /// With `skip_existing`, a previously published manifest for this
    /// subject is returned unchanged.
    ///
    /// # Errors
    ///
    /// Propagates serialization, visibility-timeout, and readiness
    /// failures.
    pub async fn publish_manifest(
        &self,
        rows: &[ManifestRecord],
        skip_existing: bool,
    ) -> Result<PublishedArtifact> {
        let stem = self.manifest_stem();
        let destination = self.layout.manifest_path(&self.subject_id, Utc::now());
        let document = manifest::to_csv(rows)?;
        let tags = vec![
            "ibl".to_string(),
            "annotation".to_string(),
            "manifest".to_string(),
            self.subject_id.clone(),
        ];
        self.publisher
            .publish_and_register(
                document,
                &destination,
                Some(&stem),
                tags,
                skip_existing,
                self.config.publish_timeout,
            )
            .instrument(publish_span("publish_manifest", &stem))
            .await
    }

    /// Returns the most recently published manifest artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no manifest has been published
    /// yet: run [`ConverterEngine::publish_manifest`] first.
    pub async fn manifest_artifact(&self) -> Result<PublishedArtifact> {
        self.publisher.lookup_by_name(&self.manifest_stem()).await
    }

    /// Triggers the conversion computation over the subject's full
    /// artifact set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no manifest has been published,
    /// [`Error::EmptyArtifactSet`] when no imaging artifact exists, and
    /// propagates directory and platform failures.
    pub async fn run_conversion(&self) -> Result<Computation> {
        let raw = self.raw_recording_artifacts().await?;
        let processed = self.processed_recording_artifacts().await?;
        let imaging = self.imaging_artifacts().await?;
        let manifest = self.manifest_artifact().await?;

        self.trigger
            .launch(&raw, &processed, &imaging, &manifest, &self.config.template_id)
            .await
    }
}

impl std::fmt::Debug for ConverterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterEngine")
            .field("subject_id", &self.subject_id)
            .field("template_id", &self.config.template_id)
            .finish_non_exhaustive()
    }
}
