//! Behavior tree library facade
//!
//! Public entry point tying the [`ArchetypeCache`] and the
//! [`InstanceFactory`] together.

use crate::cache::{ArchetypeCache, CacheStats};
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::instance::InstanceFactory;
use crate::json::{JsonTreeLoader, TaskRegistry};
use crate::loader::ArchetypeLoader;
use crate::reference::TreeRef;
use bt_task::{Node, Task, Tree};
use std::sync::Arc;

/// Library statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    /// Archetype cache statistics
    pub cache: CacheStats,
    /// Instances handed out
    pub instances_created: u64,
}

/// Repository of behavior tree archetypes
///
/// Archetypes never run; they are only cloned into instances that callers
/// own and execute. Safe to share across threads.
#[derive(Debug)]
pub struct BehaviorTreeLibrary {
    factory: InstanceFactory,
}

impl BehaviorTreeLibrary {
    /// Create library loading misses through loader
    #[must_use]
    pub fn new(loader: impl ArchetypeLoader + 'static) -> Self {
        Self::with_config(loader, &LibraryConfig::default())
    }

    /// Create configured library
    #[must_use]
    pub fn with_config(loader: impl ArchetypeLoader + 'static, config: &LibraryConfig) -> Self {
        Self::from_cache(Arc::new(ArchetypeCache::with_config(loader, config)))
    }

    /// Create library over an existing cache
    #[must_use]
    pub fn from_cache(cache: Arc<ArchetypeCache>) -> Self {
        Self {
            factory: InstanceFactory::new(cache),
        }
    }

    /// Create library that only serves registered archetypes
    #[must_use]
    pub fn registry_only() -> Self {
        Self::from_cache(Arc::new(ArchetypeCache::registry_only()))
    }

    /// Create library loading JSON definitions below the configured root
    ///
    /// # Errors
    /// Returns `LibraryError::Config` if no definitions root is configured.
    pub fn from_json_config(
        config: &LibraryConfig,
        registry: TaskRegistry,
    ) -> Result<Self, LibraryError> {
        let root = config
            .definitions_root
            .clone()
            .ok_or_else(|| LibraryError::Config("definitions_root is not set".to_string()))?;
        Ok(Self::with_config(JsonTreeLoader::new(root, registry), config))
    }

    /// Register archetype under reference, replacing any existing one
    ///
    /// # Errors
    /// Returns `LibraryError::InvalidArgument` for an empty reference.
    pub fn register(&self, reference: &str, archetype: Tree) -> Result<(), LibraryError> {
        self.cache().register(reference, archetype)
    }

    /// Check if an archetype is registered or already loaded
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.cache().contains(reference)
    }

    /// Instantiate the tree for reference, bound to blackboard
    ///
    /// # Errors
    /// `InvalidArgument`, `Load`, `Cancelled` or `CloneFailed`; see
    /// [`LibraryError`].
    pub fn create_tree<B>(
        &self,
        reference: &str,
        blackboard: Option<B>,
    ) -> Result<Tree<B>, LibraryError> {
        self.factory.create_tree(reference, blackboard)
    }

    /// Instantiate only the root task subtree for reference
    ///
    /// # Errors
    /// Additionally `Structural` if the archetype has no root task.
    pub fn create_root_task(&self, reference: &str) -> Result<Node, LibraryError> {
        self.factory.create_root_task(reference)
    }

    /// Instantiate the root task subtree, requiring it to be a `T`
    ///
    /// # Errors
    /// Additionally `TypeMismatch` if the root task is not a `T`.
    pub fn create_root_task_as<T: Task + 'static>(
        &self,
        reference: &str,
    ) -> Result<Node, LibraryError> {
        self.factory.create_root_task_as::<T>(reference)
    }

    /// References of all ready archetypes
    #[must_use]
    pub fn references(&self) -> Vec<TreeRef> {
        self.cache().references()
    }

    /// Underlying archetype cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ArchetypeCache> {
        self.factory.cache()
    }

    /// Get library statistics
    #[must_use]
    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            cache: self.cache().stats(),
            instances_created: self.factory.instances_created(),
        }
    }
}

impl Default for BehaviorTreeLibrary {
    fn default() -> Self {
        Self::registry_only()
    }
}
