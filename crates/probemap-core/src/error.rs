//! Error types and result aliases for probemap.
//!
//! This module defines the shared error type used across all probemap
//! components. The taxonomy separates fatal input failures (malformed
//! documents, unresolvable identities), bounded-wait expirations
//! (`PublishTimeout`, `ReadinessTimeout`), and the recoverable
//! `NotFound` condition that callers branch on instead of treating as
//! fatal.

/// The result type used throughout probemap.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in probemap operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An annotation-state document could not be parsed.
    ///
    /// Fatal: surfaced immediately, the caller must supply a valid document.
    #[error("malformed annotation document: {message}")]
    MalformedDocument {
        /// Description of what made the document unparseable.
        message: String,
    },

    /// No experiment identity could be extracted from any image source.
    ///
    /// Fatal, no retry: the document does not reference a recognizable
    /// experiment.
    #[error(
        "no experiment identity could be extracted from the annotation document \
         ({sources_checked} image source(s) checked)"
    )]
    AmbiguousIdentity {
        /// How many image sources were inspected.
        sources_checked: usize,
    },

    /// Image sources resolved to more than one distinct experiment identity.
    ///
    /// Fatal, no retry: one experiment per state document is a hard
    /// assumption.
    #[error("annotation documents spanning multiple experiments are unsupported: {identities:?}")]
    MultiSourceUnsupported {
        /// The distinct identities that were found.
        identities: Vec<String>,
    },

    /// A written object never became visible within the allowed window.
    ///
    /// The durable store is only eventually consistent for read-after-write;
    /// exceeding the window is fatal for the call, but the caller may retry
    /// the whole publish operation.
    #[error("object {path} not visible after {timeout_secs} second(s)")]
    PublishTimeout {
        /// Path that was written but never became visible.
        path: String,
        /// The visibility window that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// A registered artifact did not become ready within the allowed window.
    #[error("artifact {name} not ready after {timeout_secs} second(s)")]
    ReadinessTimeout {
        /// Name of the artifact that stayed unready.
        name: String,
        /// The readiness window that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The requested object or artifact does not exist (yet).
    ///
    /// Recoverable: signals "not yet created", distinct from a transient
    /// failure. Callers branch on this via [`Error::is_not_found`].
    #[error("not found: {0}")]
    NotFound(String),

    /// A required artifact collection was empty before triggering a
    /// computation.
    ///
    /// Fatal precondition violation: a partially-specified job must not be
    /// submitted.
    #[error("cannot select most-recent artifact: no {role} available")]
    EmptyArtifactSet {
        /// The role the missing artifacts would have played.
        role: &'static str,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this is the recoverable [`Error::NotFound`]
    /// condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
