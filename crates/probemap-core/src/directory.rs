//! Directory-service contract: which experiments and recording artifacts
//! exist for a subject.
//!
//! The directory is an external collaborator; the engine only reads and
//! sorts the references it returns. Partial availability is expected:
//! an experiment without a raw artifact, or with no usable processed
//! output, is a loggable gap rather than an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::id::ArtifactId;

/// Acquisition platform tag for an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    /// Extracellular electrophysiology recording.
    Ecephys,
    /// SmartSPIM light-sheet imaging.
    SmartSpim,
    /// Any other platform tag, carried verbatim.
    Other(String),
}

impl Platform {
    /// Returns the platform tag as the directory spells it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ecephys => "ecephys",
            Self::SmartSpim => "SmartSPIM",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for Platform {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "ecephys" => Self::Ecephys,
            "SmartSPIM" => Self::SmartSpim,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for Platform {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.as_str().to_string()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A handle to a remote recording data object.
///
/// Owned by the remote catalog; the engine reads and sorts references but
/// never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    /// Platform-assigned identifier.
    pub id: ArtifactId,

    /// Artifact name, unique enough for manifest rows but not deduplicated
    /// across experiments.
    pub name: String,

    /// Creation timestamp; the sort key for "most recent" selection.
    pub created_at: DateTime<Utc>,

    /// Whether the producing pipeline ended in an error outcome.
    #[serde(default)]
    pub is_error_state: bool,

    /// Whether this is an analyzer-variant output rather than a plain
    /// sorted recording.
    #[serde(default)]
    pub is_analyzer_variant: bool,
}

/// One experiment (session) known to the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    /// Directory-assigned experiment (session) identifier.
    pub id: String,

    /// Acquisition platform.
    pub platform: Platform,

    /// The raw recording artifact, when its upload has completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_artifact: Option<RecordingArtifact>,
}

/// External directory of experiments and their artifacts.
#[async_trait]
pub trait DirectoryService: Send + Sync + 'static {
    /// Lists all experiments recorded for a subject, across platforms.
    async fn list_experiments(&self, subject_id: &str) -> Result<Vec<Experiment>>;

    /// Lists the processed ("sorted") artifacts of one experiment.
    ///
    /// Includes error-state outcomes; filtering them is the caller's
    /// decision.
    async fn list_processed_artifacts(&self, experiment_id: &str)
        -> Result<Vec<RecordingArtifact>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tags_roundtrip() {
        assert_eq!(Platform::from("ecephys"), Platform::Ecephys);
        assert_eq!(Platform::from("SmartSPIM"), Platform::SmartSpim);
        assert_eq!(
            Platform::from("behavior-videos"),
            Platform::Other("behavior-videos".to_string())
        );

        assert_eq!(Platform::Ecephys.as_str(), "ecephys");
        assert_eq!(Platform::SmartSpim.as_str(), "SmartSPIM");
    }

    #[test]
    fn platform_serializes_as_directory_tag() {
        let json = serde_json::to_string(&Platform::SmartSpim).expect("serialize");
        assert_eq!(json, "\"SmartSPIM\"");
        let parsed: Platform = serde_json::from_str("\"ecephys\"").expect("parse");
        assert_eq!(parsed, Platform::Ecephys);
    }

    #[test]
    fn experiment_flags_default_to_false() {
        let json = r#"{
            "id": "01H8XGJWBWBVTH695XYPM9WM8P",
            "name": "ecephys_123456_2023-01-01_00-00-00",
            "createdAt": "2023-01-01T00:00:00Z"
        }"#;
        let artifact: RecordingArtifact = serde_json::from_str(json).expect("parse");
        assert!(!artifact.is_error_state);
        assert!(!artifact.is_analyzer_variant);
    }
}
