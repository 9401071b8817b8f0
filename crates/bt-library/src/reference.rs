//! Archetype references
//!
//! A [`TreeRef`] is an opaque key, typically a resource path. Only equality
//! and hashing are meaningful; the library never interprets its structure.

use crate::error::LibraryError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of an archetype tree
///
/// Never blank: every public way of building one goes through
/// [`parse`](Self::parse).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeRef(Arc<str>);

impl TreeRef {
    /// Parse reference, rejecting empty or blank strings
    ///
    /// # Errors
    /// Returns `LibraryError::InvalidArgument` for an empty reference.
    pub fn parse(reference: &str) -> Result<Self, LibraryError> {
        if reference.trim().is_empty() {
            return Err(LibraryError::invalid_argument(
                "archetype reference must not be empty",
            ));
        }
        Ok(Self(Arc::from(reference)))
    }

    /// Reference as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a reference the caller has already validated
    #[inline]
    pub(crate) fn from_trusted(reference: &str) -> Self {
        Self(Arc::from(reference))
    }
}

impl Serialize for TreeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TreeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reference = String::deserialize(deserializer)?;
        Self::parse(&reference).map_err(serde::de::Error::custom)
    }
}

impl Borrow<str> for TreeRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TreeRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
