//! Error types for the archetype library
//!
//! Callers must be able to tell apart:
//! - the archetype could not be produced (`Load`, `Cancelled`): retry later
//! - the archetype exists but cannot be instantiated as asked
//!   (`CloneFailed`, `Structural`, `TypeMismatch`): fix the reference or the tree
//! - the call itself was wrong (`InvalidArgument`): fix the call site

use crate::reference::TreeRef;
use bt_task::{TaskCloneError, TreeError};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;

/// Boxed error returned by loaders
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Loader failure for a reference
///
/// The cause is shared so that every caller waiting on the same load
/// receives the identical error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load archetype '{reference}': {cause}")]
pub struct LoadError {
    /// Reference that failed to load
    pub reference: TreeRef,
    /// Underlying loader error
    #[source]
    pub cause: Arc<dyn StdError + Send + Sync>,
}

impl LoadError {
    /// Wrap loader error for reference
    pub fn new(reference: TreeRef, cause: BoxError) -> Self {
        Self {
            reference,
            cause: Arc::from(cause),
        }
    }

    /// Whether two errors share the same underlying cause
    #[must_use]
    pub fn same_cause(&self, other: &LoadError) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

/// Main library error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum LibraryError {
    /// Bad input to a library operation
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong
        reason: String,
    },

    /// Loader failed to produce the archetype
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A task in the archetype refused or failed to clone
    #[error("cannot clone archetype '{reference}': {source}")]
    CloneFailed {
        /// Archetype reference
        reference: TreeRef,
        /// Task-level failure
        #[source]
        source: TaskCloneError,
    },

    /// Archetype shape violates an instancing precondition
    #[error("archetype '{reference}' is malformed: {source}")]
    Structural {
        /// Archetype reference
        reference: TreeRef,
        /// Structural violation
        #[source]
        source: TreeError,
    },

    /// Caller expected a different root task type
    #[error("archetype '{reference}' root is {actual}, expected {expected}")]
    TypeMismatch {
        /// Archetype reference
        reference: TreeRef,
        /// Requested task type
        expected: &'static str,
        /// Actual task type
        actual: &'static str,
    },

    /// Waiting on an in-flight load was abandoned
    #[error("load of '{reference}' cancelled: {reason}")]
    Cancelled {
        /// Archetype reference
        reference: TreeRef,
        /// Why the wait ended
        reason: String,
    },

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl LibraryError {
    /// Create invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create cancellation error
    pub fn cancelled(reference: TreeRef, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reference,
            reason: reason.into(),
        }
    }

    /// Check if calling again may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Cancelled { .. })
    }

    /// Check if error stems from the call site rather than the archetype
    #[inline]
    #[must_use]
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::TypeMismatch { .. }
        )
    }

    /// Reference the error is about, if any
    #[must_use]
    pub fn reference(&self) -> Option<&TreeRef> {
        match self {
            Self::Load(err) => Some(&err.reference),
            Self::CloneFailed { reference, .. }
            | Self::Structural { reference, .. }
            | Self::TypeMismatch { reference, .. }
            | Self::Cancelled { reference, .. } => Some(reference),
            Self::InvalidArgument { .. } | Self::Config(_) => None,
        }
    }
}

/// Errors of the JSON definition loader
#[derive(Debug, thiserror::Error)]
pub enum JsonLoadError {
    /// Reference resolves outside the definitions root
    #[error("reference '{0}' escapes the definitions root")]
    InvalidPath(String),

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// IO failure
        #[source]
        source: std::io::Error,
    },

    /// Definition is not valid JSON or does not match the schema
    #[error("invalid definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// No constructor registered for task name
    #[error("unknown task: '{0}'")]
    UnknownTask(String),

    /// Constructor rejected its parameters
    #[error("cannot construct task '{task}': {reason}")]
    Construct {
        /// Task name
        task: String,
        /// Constructor failure
        reason: String,
    },

    /// Definition violates node arity
    #[error("invalid structure: {0}")]
    Structure(#[from] TreeError),
}

impl JsonLoadError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;
