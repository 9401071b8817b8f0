//! Error types for tree structure and task cloning

/// Structural violations of a behavior tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Root has no child to instantiate
    #[error("archetype has no designated root child")]
    NoRootChild,

    /// Leaf tasks cannot own children
    #[error("leaf task '{task}' cannot have children")]
    LeafHasNoChildren {
        /// Name of the offending task
        task: String,
    },

    /// Decorators wrap exactly one child
    #[error("decorator '{task}' already has a child")]
    DecoratorArity {
        /// Name of the offending task
        task: String,
    },
}

/// Errors raised while cloning a task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskCloneError {
    /// Task does not support cloning
    #[error("task '{task}' does not support cloning")]
    Unsupported {
        /// Name of the task
        task: String,
    },

    /// Task failed while producing its clone
    #[error("task '{task}' failed to clone: {reason}")]
    Failed {
        /// Name of the task
        task: String,
        /// Failure description
        reason: String,
    },

    /// Clone is not the same variant as its source
    #[error("task '{task}' cloned into {actual}, expected {expected}")]
    VariantMismatch {
        /// Name of the task
        task: String,
        /// Source type/kind
        expected: String,
        /// Produced type/kind
        actual: String,
    },
}

impl TaskCloneError {
    /// Create unsupported error for task
    pub fn unsupported(task: impl Into<String>) -> Self {
        Self::Unsupported { task: task.into() }
    }

    /// Create failure error for task
    pub fn failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Name of the task that failed to clone
    #[must_use]
    pub fn task(&self) -> &str {
        match self {
            Self::Unsupported { task }
            | Self::Failed { task, .. }
            | Self::VariantMismatch { task, .. } => task,
        }
    }
}
