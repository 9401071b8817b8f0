//! Behavior Tree Archetype Library
//!
//! A repository of behavior tree archetypes. Archetypes are built at most
//! once per reference and never run; callers receive independent clones.
//!
//! # Architecture
//!
//! ```text
//! caller ─▶ BehaviorTreeLibrary ─▶ InstanceFactory ─▶ clone ─▶ Tree<B> (owned)
//!                                        │
//!                                        ▼
//!                                 ArchetypeCache ──miss──▶ ArchetypeLoader
//!                                 (single-flight)          (once per reference)
//! ```
//!
//! # Example
//!
//! ```rust
//! use bt_library::BehaviorTreeLibrary;
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
//! let library = BehaviorTreeLibrary::registry_only();
//! library.register("ai/idle", Tree::with_root(Node::new(Idle))).unwrap();
//!
//! let npc = library.create_tree("ai/idle", Some(42u32)).unwrap();
//! assert_eq!(npc.blackboard(), Some(&42));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod instance;
pub mod json;
pub mod library;
pub mod loader;
pub mod reference;

// Re-exports for convenience
pub use cache::{ArchetypeCache, CacheStats};
pub use config::LibraryConfig;
pub use error::{BoxError, JsonLoadError, LibraryError, LibraryResult, LoadError};
pub use instance::{clone_subtree, instantiate, InstanceFactory};
pub use json::{JsonTreeLoader, NodeDef, Params, TaskConstructor, TaskRegistry, TreeDef};
pub use library::{BehaviorTreeLibrary, LibraryStats};
pub use loader::{loader_fn, ArchetypeLoader, FnLoader, NoLoader};
pub use reference::TreeRef;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the library
    pub use crate::cache::ArchetypeCache;
    pub use crate::error::{LibraryError, LoadError};
    pub use crate::library::BehaviorTreeLibrary;
    pub use crate::loader::{loader_fn, ArchetypeLoader};
    pub use crate::reference::TreeRef;
    pub use bt_task::{Node, Status, Task, TaskCloneError, TaskKind, Tree};
}
