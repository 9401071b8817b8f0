//! Behavior Tree Task Model
//!
//! The capability interface the archetype library relies on.
//!
//! # Core Concepts
//!
//! - [`Task`]: variant payload of a node; knows its [`TaskKind`] and how to
//!   produce an independent copy of itself
//! - [`Node`]: task + execution [`Status`] + arity-checked children
//! - [`Tree`]: root with a blackboard slot; archetypes are `Tree<()>`
//!
//! # Example
//!
//! ```rust
//! use bt_task::{Node, Task, TaskCloneError, TaskKind, Tree};
//!
//! #[derive(Debug)]
//! struct Idle;
//!
//! impl Task for Idle {
//!     fn name(&self) -> &str {
//!         "idle"
//!     }
//!
//!     fn kind(&self) -> TaskKind {
//!         TaskKind::Leaf
//!     }
//!
//!     fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
//!         Ok(Box::new(Idle))
//!     }
//! }
//!
//! let archetype: Tree = Tree::with_root(Node::new(Idle));
//! assert_eq!(archetype.first_child().unwrap().name(), "idle");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod node;
pub mod task;
pub mod tree;

// Re-exports
pub use error::{TaskCloneError, TreeError};
pub use node::{Iter, Node};
pub use task::{AsAny, Status, Task, TaskKind};
pub use tree::{InstanceId, Tree};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
