//! Task capability interface
//!
//! A [`Task`] is the variant-specific payload of a [`Node`](crate::Node).
//! The tree structure (children, status) lives in the node; the task carries
//! configuration and any execution-time scratch state of its own.

use crate::error::TaskCloneError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Arity class of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Any number of children (sequence, selector, parallel...)
    Composite,
    /// Exactly one wrapped child
    Decorator,
    /// No children
    Leaf,
}

impl TaskKind {
    /// Maximum number of children, `None` if unbounded
    #[inline]
    #[must_use]
    pub const fn max_children(self) -> Option<usize> {
        match self {
            Self::Composite => None,
            Self::Decorator => Some(1),
            Self::Leaf => Some(0),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Composite => "composite",
            Self::Decorator => "decorator",
            Self::Leaf => "leaf",
        };
        f.write_str(name)
    }
}

/// Execution-time status of a node or tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Never run, or reset
    #[default]
    Fresh,
    /// Currently running
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with failure
    Failed,
    /// Terminated before completion
    Cancelled,
}

impl Status {
    /// Whether the status is terminal
    #[inline]
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Downcasting support for task trait objects
///
/// Implemented for every `'static` type; task authors never implement it.
pub trait AsAny {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Concrete type name
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Variant payload of a behavior tree node
///
/// # Cloning contract
///
/// [`clone_task`](Task::clone_task) returns a new task of the same concrete
/// type and kind. Configuration may be shared (e.g. behind an `Arc`) since it
/// is never mutated; execution-time state must be freshly initialized and
/// never aliased with the source.
pub trait Task: AsAny + Send + Sync + fmt::Debug {
    /// Human-readable task name
    fn name(&self) -> &str;

    /// Arity class
    fn kind(&self) -> TaskKind;

    /// Produce an independent copy with fresh execution state
    ///
    /// # Errors
    /// Returns [`TaskCloneError`] if the task cannot be cloned.
    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError>;

    /// Reset execution-time state
    fn reset(&mut self) {}
}
