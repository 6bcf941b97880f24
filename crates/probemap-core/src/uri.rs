//! Typed storage URIs.
//!
//! A [`StorageUri`] is the parsed form of an object-store location such as
//! `s3://bucket/prefix/object.json`. Registering a remote artifact requires
//! the `{bucket, prefix}` pair of its backing object; deriving that pair by
//! splitting a path string on its second segment is fragile, so all
//! destinations flow through this type and the split happens exactly once,
//! at parse time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed object-store location: `{scheme}://{bucket}/{key}`.
///
/// The key never carries leading or trailing separators; an empty key
/// addresses the bucket root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageUri {
    scheme: String,
    bucket: String,
    key: String,
}

impl StorageUri {
    /// Parses a URI of the form `scheme://bucket/key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the scheme or bucket is missing.
    pub fn parse(input: &str) -> Result<Self> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| Error::InvalidInput(format!("storage URI missing scheme: {input}")))?;
        if scheme.is_empty() {
            return Err(Error::InvalidInput(format!(
                "storage URI missing scheme: {input}"
            )));
        }

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(Error::InvalidInput(format!(
                "storage URI missing bucket: {input}"
            )));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.trim_matches('/').to_string(),
        })
    }

    /// Returns the URI scheme (e.g. `s3`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the object key, without leading or trailing separators.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a new URI with `segment` appended to the key.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let key = if self.key.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{segment}", self.key)
        };
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Returns the final key segment, if the key is non-empty.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.key.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Returns the final key segment with its extension removed.
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        self.file_name()
            .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
        }
    }
}

impl FromStr for StorageUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StorageUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StorageUri> for String {
    fn from(uri: StorageUri) -> Self {
        uri.to_string()
    }
}
