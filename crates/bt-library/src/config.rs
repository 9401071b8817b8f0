//! Library configuration

use crate::error::LibraryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Archetype library configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// How long a caller waits on another caller's in-flight load, in
    /// milliseconds. `None` waits until the load settles.
    pub load_wait_timeout_ms: Option<u64>,
    /// Directory the JSON loader resolves references against
    pub definitions_root: Option<PathBuf>,
}

impl LibraryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML
    ///
    /// # Errors
    /// Returns `LibraryError::Config` if the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, LibraryError> {
        toml::from_str(source).map_err(|e| LibraryError::Config(e.to_string()))
    }

    /// With load wait timeout
    #[inline]
    #[must_use]
    pub fn with_load_wait_timeout(mut self, timeout: Duration) -> Self {
        self.load_wait_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// With definitions root
    #[inline]
    #[must_use]
    pub fn with_definitions_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.definitions_root = Some(root.into());
        self
    }

    /// Load wait timeout as duration
    #[inline]
    #[must_use]
    pub fn load_wait_timeout(&self) -> Option<Duration> {
        self.load_wait_timeout_ms.map(Duration::from_millis)
    }
}
