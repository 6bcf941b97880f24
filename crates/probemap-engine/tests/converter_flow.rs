//! End-to-end flow over the in-memory collaborator doubles: annotation
//! document in, manifest rows out, publish with idempotent re-use, and the
//! final conversion trigger with its exact attachment order.

use std::sync::Arc;
use std::time::Duration;

use probemap_core::error::Error;
use probemap_core::uri::StorageUri;
use probemap_core::Platform;
use probemap_core::StorageBackend;
use probemap_engine::engine::{ConverterEngine, EngineConfig};
use probemap_engine::state::AnnotationState;
use probemap_test_utils::compute::MemoryCompute;
use probemap_test_utils::directory::MemoryDirectory;
use probemap_test_utils::fixtures;
use probemap_test_utils::storage::EventualBackend;

const SUBJECT: &str = "123456";

fn config() -> EngineConfig {
    let mut config = EngineConfig::new(
        StorageUri::parse("s3://scratch/annotation").expect("uri"),
        "capsule-1",
    );
    config.publish_timeout = Duration::from_secs(2);
    config.poll_interval = Duration::from_millis(5);
    config
}

/// Directory with two usable ecephys experiments, one degraded experiment
/// (no raw upload, failing processed listing), and two imaging sessions.
fn seeded_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();

    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment(
            "exp-a",
            Platform::Ecephys,
            Some(fixtures::recording_artifact("raw-a", 3)),
        ),
    );
    directory.insert_processed("exp-a", vec![fixtures::recording_artifact("sorted-a", 2)]);

    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment(
            "exp-b",
            Platform::Ecephys,
            Some(fixtures::recording_artifact("raw-b", 1)),
        ),
    );
    directory.insert_processed("exp-b", vec![fixtures::recording_artifact("sorted-b", 1)]);

    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment("exp-degraded", Platform::Ecephys, None),
    );
    directory.fail_processed_listing("exp-degraded");

    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment(
            "imaging-old",
            Platform::SmartSpim,
            Some(fixtures::recording_artifact("spim-old", 0)),
        ),
    );
    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment(
            "imaging-new",
            Platform::SmartSpim,
            Some(fixtures::recording_artifact("spim-new", 4)),
        ),
    );

    directory
}

fn engine(
    directory: MemoryDirectory,
    storage: Arc<EventualBackend>,
    compute: Arc<MemoryCompute>,
) -> ConverterEngine {
    ConverterEngine::new(SUBJECT, Arc::new(directory), storage, compute, config())
}

#[tokio::test]
async fn annotation_to_conversion_flow() {
    let storage = Arc::new(EventualBackend::with_visibility_lag(2));
    let compute = Arc::new(MemoryCompute::new());
    let engine = engine(seeded_directory(), Arc::clone(&storage), Arc::clone(&compute));

    // Publish the annotation document; the engine rides out the
    // read-after-write lag before registering it.
    let state = AnnotationState::from_value(fixtures::single_session_state()).expect("state");
    let state_artifact = engine.publish_state(&state).await.expect("publish state");
    assert!(state_artifact
        .name
        .starts_with("SmartSPIM_123456_2023-01-01_00-00-00_neuroglancer-state_"));

    // The persisted document is now the subject's most recent one.
    let latest = engine.latest_state().await.expect("latest state");
    assert_eq!(latest.annotation_labels(), vec!["probeA", "probeB"]);

    // Manifest rows: labels x processed recordings, label-major, with the
    // degraded experiment excluded.
    let rows = engine.build_manifest(None, &[]).await.expect("manifest rows");
    let pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|row| (row.probe_id.as_str(), row.sorted_recording.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("probeA", "sorted-a"),
            ("probeA", "sorted-b"),
            ("probeB", "sorted-a"),
            ("probeB", "sorted-b"),
        ]
    );
    assert!(rows.iter().all(|row| row.mouseid == SUBJECT));

    // Publishing twice with skip_existing re-uses the first artifact and
    // writes nothing new.
    let first = engine.publish_manifest(&rows, true).await.expect("publish manifest");
    let second = engine.publish_manifest(&rows, true).await.expect("re-publish manifest");
    assert_eq!(first.id, second.id);
    let manifest_objects = storage
        .list("s3://scratch/annotation/manifests/")
        .await
        .expect("list manifests");
    assert_eq!(manifest_objects.len(), 1, "no second write happened");

    // The stored manifest carries the contractual header and all rows.
    let stored = storage
        .get(&manifest_objects[0].path)
        .await
        .expect("read manifest");
    let text = std::str::from_utf8(&stored).expect("utf8");
    assert!(text.starts_with(
        "mouseid,probe_id,probe_name,sorted_recording,probe_file,surface_finding,annotation_format"
    ));
    assert_eq!(text.lines().count(), 5, "header plus four rows");

    // The conversion runs over the exact, ordered artifact set.
    let computation = engine.run_conversion().await.expect("run conversion");
    assert_eq!(computation.template_id, "capsule-1");

    let submitted = compute.computations();
    assert_eq!(submitted.len(), 1);
    let mounts: Vec<&str> = submitted[0]
        .attachments
        .iter()
        .map(|attachment| attachment.mount.as_str())
        .collect();
    assert_eq!(
        mounts,
        vec![
            "raw-b",
            "raw-a",
            "sorted-b",
            "sorted-a",
            "spim-new",
            "123456_data-converter-manifest",
        ],
        "raw recordings, processed recordings, most-recent imaging, manifest"
    );
}

#[tokio::test]
async fn conversion_requires_a_published_manifest() {
    let storage = Arc::new(EventualBackend::immediate());
    let compute = Arc::new(MemoryCompute::new());
    let engine = engine(seeded_directory(), storage, Arc::clone(&compute));

    let result = engine.run_conversion().await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(compute.computations().is_empty());
}

#[tokio::test]
async fn conversion_requires_an_imaging_artifact() {
    let storage = Arc::new(EventualBackend::immediate());
    let compute = Arc::new(MemoryCompute::new());

    // A subject with ecephys data but no imaging session.
    let directory = MemoryDirectory::new();
    directory.insert_experiment(
        SUBJECT,
        fixtures::experiment(
            "exp-a",
            Platform::Ecephys,
            Some(fixtures::recording_artifact("raw-a", 1)),
        ),
    );
    directory.insert_processed("exp-a", vec![fixtures::recording_artifact("sorted-a", 1)]);

    let engine = engine(directory, storage, Arc::clone(&compute));
    let rows = vec![probemap_engine::manifest::ManifestRecord::new(
        SUBJECT, "probeA", "sorted-a", "state",
    )];
    engine.publish_manifest(&rows, true).await.expect("publish manifest");

    let result = engine.run_conversion().await;
    assert!(matches!(result, Err(Error::EmptyArtifactSet { .. })));
    assert!(compute.computations().is_empty());
}
