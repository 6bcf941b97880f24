//! # probemap-core
//!
//! Shared contracts and primitives for the probemap annotation-conversion
//! pipeline.
//!
//! This crate provides the types and traits used across all probemap
//! components:
//!
//! - **Identifiers**: strongly-typed IDs for artifacts and computations
//! - **Storage**: the durable object-store contract and typed storage URIs
//! - **Paths**: the persisted-document naming contract
//! - **Directory / Compute**: the external-collaborator contracts the
//!   engine is composed with
//! - **Errors**: the shared error taxonomy and result type
//!
//! ## Crate Boundary
//!
//! `probemap-core` is the only crate allowed to define shared primitives.
//! The engine and test doubles interact exclusively through the contracts
//! defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod compute;
pub mod directory;
pub mod error;
pub mod id;
pub mod observability;
pub mod paths;
pub mod storage;
pub mod uri;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use probemap_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{Clock, SystemClock, TtlCache};
    pub use crate::compute::{
        ArtifactParams, ArtifactSource, AttachedArtifact, Computation, ComputePlatform,
        PublishedArtifact, ReadyState,
    };
    pub use crate::directory::{DirectoryService, Experiment, Platform, RecordingArtifact};
    pub use crate::error::{Error, Result};
    pub use crate::id::{ArtifactId, ComputationId};
    pub use crate::paths::{DocumentKind, StorageLayout};
    pub use crate::storage::{MemoryBackend, ObjectMeta, StorageBackend};
    pub use crate::uri::StorageUri;
}

// Re-export key types at crate root for ergonomics
pub use cache::{Clock, SystemClock, TtlCache};
pub use compute::{
    ArtifactParams, ArtifactSource, AttachedArtifact, Computation, ComputePlatform,
    PublishedArtifact, ReadyState,
};
pub use directory::{DirectoryService, Experiment, Platform, RecordingArtifact};
pub use error::{Error, Result};
pub use id::{ArtifactId, ComputationId};
pub use observability::{init_logging, LogFormat};
pub use paths::{DocumentKind, StorageLayout, TIMESTAMP_FORMAT};
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend};
pub use uri::StorageUri;
