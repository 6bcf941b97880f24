//! Canonical fixtures for probemap test suites.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use probemap_core::compute::{ArtifactSource, PublishedArtifact, ReadyState};
use probemap_core::directory::{Experiment, Platform, RecordingArtifact};
use probemap_core::id::ArtifactId;

/// Builds an annotation-state document with the given image sources and
/// annotation labels, in order.
#[must_use]
pub fn state_with(sources: &[&str], labels: &[&str]) -> Value {
    let mut layers: Vec<Value> = sources
        .iter()
        .map(|source| json!({"type": "image", "source": source}))
        .collect();
    layers.extend(
        labels
            .iter()
            .map(|label| json!({"type": "annotation", "name": label})),
    );
    json!({
        "dimensions": {"x": [1e-6, "m"], "y": [1e-6, "m"], "z": [1e-6, "m"]},
        "layers": layers,
    })
}

/// The canonical single-experiment document: one SmartSPIM source for
/// subject `123456`, labels `probeA` and `probeB`.
#[must_use]
pub fn single_session_state() -> Value {
    state_with(
        &["s3://aind-open-data/SmartSPIM_123456_2023-01-01_00-00-00/derivatives/stitched.zarr"],
        &["probeA", "probeB"],
    )
}

/// Builds a recording artifact created `created_offset_hours` after the
/// fixture epoch.
#[must_use]
pub fn recording_artifact(name: &str, created_offset_hours: i64) -> RecordingArtifact {
    let epoch = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).single().expect("fixture epoch");
    RecordingArtifact {
        id: ArtifactId::generate(),
        name: name.to_string(),
        created_at: epoch + chrono::Duration::hours(created_offset_hours),
        is_error_state: false,
        is_analyzer_variant: false,
    }
}

/// Builds an experiment with an optional raw artifact.
#[must_use]
pub fn experiment(id: &str, platform: Platform, raw: Option<RecordingArtifact>) -> Experiment {
    Experiment {
        id: id.to_string(),
        platform,
        raw_artifact: raw,
    }
}

/// Builds a ready platform artifact created `created_offset_hours` after
/// the fixture epoch.
#[must_use]
pub fn published_artifact(name: &str, created_offset_hours: i64) -> PublishedArtifact {
    let epoch = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).single().expect("fixture epoch");
    PublishedArtifact {
        id: ArtifactId::generate(),
        name: name.to_string(),
        source: ArtifactSource {
            bucket: "scratch".to_string(),
            prefix: format!("annotation/{name}"),
        },
        ready_state: ReadyState::Ready,
        created_at: epoch + chrono::Duration::hours(created_offset_hours),
    }
}
