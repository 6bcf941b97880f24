//! Canonical storage paths and document names.
//!
//! This module is the single source of truth for the persisted-state layout.
//! All writers construct paths through [`StorageLayout`]; no hardcoded path
//! strings should exist outside this module.
//!
//! # Layout
//!
//! ```text
//! {root}/
//! ├── neuroglancer_states/
//! │   └── {identity}_neuroglancer-state_{timestamp}.json
//! └── manifests/
//!     └── {subject}_data-converter-manifest_{timestamp}.csv
//! ```
//!
//! # Naming contract
//!
//! Documents are named `<identity>_<kind>_<UTC timestamp>.<ext>` with the
//! timestamp formatted `%Y-%m-%d_%H-%M-%S`. The name is load-bearing: "most
//! recent" selection is a lexical sort over document stems, and artifact
//! lookup is by derived name, so the format must not change.

use chrono::{DateTime, Utc};

use crate::uri::StorageUri;

/// Timestamp format used in document names (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// The kind of persisted document, as it appears in document names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// An annotation-state document (Neuroglancer state JSON).
    NeuroglancerState,
    /// A conversion work manifest (CSV).
    ConverterManifest,
}

impl DocumentKind {
    /// Returns the kind token used in document names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NeuroglancerState => "neuroglancer-state",
            Self::ConverterManifest => "data-converter-manifest",
        }
    }

    /// Returns the file extension for this kind.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::NeuroglancerState => "json",
            Self::ConverterManifest => "csv",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Path generator rooted at the configured storage location.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: StorageUri,
}

impl StorageLayout {
    /// Directory for persisted annotation-state documents.
    pub const STATES_DIR: &'static str = "neuroglancer_states";

    /// Directory for persisted manifests.
    pub const MANIFESTS_DIR: &'static str = "manifests";

    /// Creates a layout rooted at the given storage location.
    #[must_use]
    pub fn new(root: StorageUri) -> Self {
        Self { root }
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &StorageUri {
        &self.root
    }

    /// Returns the annotation-state directory.
    #[must_use]
    pub fn states_dir(&self) -> StorageUri {
        self.root.join(Self::STATES_DIR)
    }

    /// Returns the manifest directory.
    #[must_use]
    pub fn manifests_dir(&self) -> StorageUri {
        self.root.join(Self::MANIFESTS_DIR)
    }

    /// Returns the timestamp-free document stem: `<identity>_<kind>`.
    ///
    /// The stem is the stable prefix used for name-based artifact lookup.
    #[must_use]
    pub fn document_stem(identity: &str, kind: DocumentKind) -> String {
        format!("{identity}_{kind}")
    }

    /// Returns the full document name: `<identity>_<kind>_<timestamp>.<ext>`.
    #[must_use]
    pub fn document_name(identity: &str, kind: DocumentKind, at: DateTime<Utc>) -> String {
        format!(
            "{}_{}.{}",
            Self::document_stem(identity, kind),
            at.format(TIMESTAMP_FORMAT),
            kind.extension()
        )
    }

    /// Returns the path for an annotation-state document written at `at`.
    #[must_use]
    pub fn state_path(&self, identity: &str, at: DateTime<Utc>) -> StorageUri {
        self.states_dir().join(&Self::document_name(
            identity,
            DocumentKind::NeuroglancerState,
            at,
        ))
    }

    /// Returns the path for a manifest written at `at`.
    #[must_use]
    pub fn manifest_path(&self, subject_id: &str, at: DateTime<Utc>) -> StorageUri {
        self.manifests_dir().join(&Self::document_name(
            subject_id,
            DocumentKind::ConverterManifest,
            at,
        ))
    }
}
