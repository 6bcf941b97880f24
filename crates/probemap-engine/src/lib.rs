//! # probemap-engine
//!
//! The manifest orchestration engine: links manual probe-annotation
//! documents to recorded and processed experiment data, builds the
//! conversion work manifest, publishes both as durable remote artifacts,
//! and triggers the downstream conversion computation.
//!
//! ## Pipeline
//!
//! 1. [`state`] parses an annotation document and recovers the experiment
//!    identity and annotation labels.
//! 2. [`catalog`] discovers the subject's recording artifacts from the
//!    remote directory, with deterministic time-sorted ordering.
//! 3. [`manifest`] crosses annotation labels with recording names into
//!    manifest rows.
//! 4. [`publisher`] publishes documents under eventually-consistent
//!    storage, registers them as remote artifacts, and waits for
//!    readiness.
//! 5. [`trigger`] submits the conversion computation over the exact,
//!    ordered artifact set.
//!
//! [`engine::ConverterEngine`] composes the five over injected
//! collaborator contracts from `probemap-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod engine;
pub mod manifest;
pub mod publisher;
pub mod state;
pub mod trigger;

pub use catalog::ArtifactCatalog;
pub use engine::{ConverterEngine, EngineConfig};
pub use manifest::{build_rows, ManifestRecord, COLUMNS};
pub use publisher::{wait_until_visible, ArtifactPublisher};
pub use state::{AnnotationState, ExperimentIdentity};
pub use trigger::ConversionTrigger;
