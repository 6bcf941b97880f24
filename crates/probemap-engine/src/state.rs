//! Annotation-state model.
//!
//! An [`AnnotationState`] wraps a parsed Neuroglancer state document. The
//! document is never mutated after construction; everything the engine
//! needs (image sources, annotation labels, the experiment identity) is
//! derived from `content` on access. Identity resolution is the one
//! derived property that is cached, because it is the single point where
//! the one-experiment-per-document assumption is enforced.

use bytes::Bytes;
use chrono::{NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use probemap_core::error::{Error, Result};
use probemap_core::paths::{StorageLayout, TIMESTAMP_FORMAT};
use probemap_core::storage::StorageBackend;
use probemap_core::uri::StorageUri;
use probemap_core::Platform;

use crate::publisher::wait_until_visible;

/// Matches an experiment identity token: `<platform>_<subject>_<timestamp>`.
fn identity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"([A-Za-z][A-Za-z0-9]*)_([0-9]{6,})_([0-9]{4}-[0-9]{2}-[0-9]{2})_([0-9]{2}-[0-9]{2}-[0-9]{2})",
        )
        .expect("identity pattern is valid")
    })
}

/// The structured identity of one experiment, recovered from a recording's
/// storage path.
///
/// The canonical string form is `<platform>_<subject>_<%Y-%m-%d_%H-%M-%S>`,
/// e.g. `SmartSPIM_123456_2023-01-01_00-00-00`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentIdentity {
    /// Acquisition platform of the identifying recording.
    pub platform: Platform,
    /// Subject (mouse) identifier.
    pub subject_id: String,
    /// Acquisition timestamp encoded in the path.
    pub acquired_at: NaiveDateTime,
}

impl ExperimentIdentity {
    /// Finds the first identity token embedded anywhere in `text`.
    ///
    /// Returns `None` when no token matches; a candidate whose timestamp
    /// digits do not form a valid date-time is also rejected. This matcher
    /// is intentionally strict: only unambiguous tokens resolve.
    #[must_use]
    pub fn search(text: &str) -> Option<Self> {
        let captures = identity_pattern().captures(text)?;
        let timestamp = format!("{}_{}", &captures[3], &captures[4]);
        let acquired_at = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            platform: Platform::from(&captures[1]),
            subject_id: captures[2].to_string(),
            acquired_at,
        })
    }
}

impl fmt::Display for ExperimentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.platform,
            self.subject_id,
            self.acquired_at.format(TIMESTAMP_FORMAT)
        )
    }
}

impl FromStr for ExperimentIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::search(s) {
            Some(identity) if identity.to_string() == s => Ok(identity),
            _ => Err(Error::InvalidInput(format!(
                "not an experiment identity: {s}"
            ))),
        }
    }
}

/// Immutable wrapper over a parsed annotation-state document.
pub struct AnnotationState {
    content: Value,
    identity: OnceLock<ExperimentIdentity>,
}

impl AnnotationState {
    /// Parses an annotation-state document from raw JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDocument`] when the text is not valid JSON
    /// or the root is not an object.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::MalformedDocument {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Wraps an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDocument`] when the root is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::MalformedDocument {
                message: "expected a JSON object at the document root".to_string(),
            });
        }
        Ok(Self {
            content: value,
            identity: OnceLock::new(),
        })
    }

    /// Loads and parses a persisted annotation-state document.
    ///
    /// # Errors
    ///
    /// Propagates storage errors and [`Error::MalformedDocument`].
    pub async fn load(storage: &dyn StorageBackend, path: &StorageUri) -> Result<Self> {
        let bytes = storage.get(&path.to_string()).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| Error::MalformedDocument {
            message: format!("document is not UTF-8: {e}"),
        })?;
        Self::parse(text)
    }

    /// Returns the raw document.
    #[must_use]
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Returns the image-layer sources, in document order.
    ///
    /// A source may be a bare string or an object carrying a `url` field.
    /// Returns an empty vec when the expected substructure is absent.
    #[must_use]
    pub fn image_sources(&self) -> Vec<String> {
        let Some(layers) = self.content.get("layers").and_then(Value::as_array) else {
            return Vec::new();
        };
        layers
            .iter()
            .filter(|layer| layer.get("type").and_then(Value::as_str) == Some("image"))
            .filter_map(|layer| match layer.get("source") {
                Some(Value::String(source)) => Some(source.clone()),
                Some(source) => source
                    .get("url")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                None => None,
            })
            .collect()
    }

    /// Returns the annotation-layer names, in document order.
    ///
    /// Duplicates are preserved as-is; deduplication is the caller's
    /// decision. Returns an empty vec when the expected substructure is
    /// absent.
    #[must_use]
    pub fn annotation_labels(&self) -> Vec<String> {
        let Some(layers) = self.content.get("layers").and_then(Value::as_array) else {
            return Vec::new();
        };
        layers
            .iter()
            .filter(|layer| layer.get("type").and_then(Value::as_str) == Some("annotation"))
            .filter_map(|layer| {
                layer
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .collect()
    }

    /// Resolves the experiment identity from the image sources.
    ///
    /// Sources that do not match the identity pattern are skipped silently;
    /// only the overall outcome can fail. The resolved identity is cached
    /// for the object's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousIdentity`] when no source yields an
    /// identity, and [`Error::MultiSourceUnsupported`] when sources yield
    /// more than one distinct identity.
    pub fn identity(&self) -> Result<&ExperimentIdentity> {
        if let Some(identity) = self.identity.get() {
            return Ok(identity);
        }
        let resolved = self.resolve_identity()?;
        Ok(self.identity.get_or_init(|| resolved))
    }

    /// Returns the subject identifier from the resolved identity.
    ///
    /// # Errors
    ///
    /// Same conditions as [`AnnotationState::identity`].
    pub fn subject_id(&self) -> Result<String> {
        Ok(self.identity()?.subject_id.clone())
    }

    fn resolve_identity(&self) -> Result<ExperimentIdentity> {
        let sources = self.image_sources();
        let mut distinct: Vec<ExperimentIdentity> = Vec::new();
        for source in &sources {
            if let Some(identity) = ExperimentIdentity::search(source) {
                if !distinct.contains(&identity) {
                    distinct.push(identity);
                }
            }
        }
        match distinct.as_slice() {
            [] => Err(Error::AmbiguousIdentity {
                sources_checked: sources.len(),
            }),
            [identity] => Ok(identity.clone()),
            _ => Err(Error::MultiSourceUnsupported {
                identities: distinct.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Serializes the document to `destination` (default: a generated name
    /// under the layout's states directory) and polls until the written
    /// object is externally visible.
    ///
    /// # Errors
    ///
    /// Propagates identity-resolution and storage errors, and returns
    /// [`Error::PublishTimeout`] when the object never becomes visible
    /// within `timeout`.
    pub async fn persist(
        &self,
        storage: &dyn StorageBackend,
        layout: &StorageLayout,
        destination: Option<StorageUri>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<StorageUri> {
        let destination = match destination {
            Some(destination) => destination,
            None => layout.state_path(&self.identity()?.to_string(), Utc::now()),
        };
        let path = destination.to_string();
        debug!(path = %path, "writing annotation document");

        let text =
            serde_json::to_string_pretty(&self.content).map_err(|e| Error::Serialization {
                message: format!("failed to serialize annotation document: {e}"),
            })?;
        storage.put(&path, Bytes::from(text)).await?;
        wait_until_visible(storage, &path, timeout, poll_interval).await?;

        debug!(path = %path, "annotation document visible");
        Ok(destination)
    }
}

impl fmt::Debug for AnnotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Ok(identity) => write!(f, "AnnotationState({identity})"),
            Err(_) => {
                let keys: Vec<&String> = self
                    .content
                    .as_object()
                    .map(|map| map.keys().collect())
                    .unwrap_or_default();
                write!(f, "AnnotationState({keys:?})")
            }
        }
    }
}
