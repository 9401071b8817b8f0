//! Clone-based instancing
//!
//! Archetypes are never handed out for execution. The [`InstanceFactory`]
//! resolves an archetype through the [`ArchetypeCache`] and returns a deep
//! copy owned exclusively by the caller.
//!
//! # Clone algorithm
//!
//! Post-order traversal with an explicit stack: each source node gets a new
//! node of the same concrete task type, built from
//! [`Task::clone_task`] (configuration may be shared, execution state is
//! fresh), a `Fresh` status, and child links to the freshly cloned children.
//! Trees are acyclic, so this is a plain tree copy.

use crate::cache::ArchetypeCache;
use crate::error::LibraryError;
use crate::reference::TreeRef;
use bt_task::{InstanceId, Node, Task, TaskCloneError, Tree};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Produces independent tree instances from cached archetypes
#[derive(Debug)]
pub struct InstanceFactory {
    cache: Arc<ArchetypeCache>,
    created: AtomicU64,
}

impl InstanceFactory {
    /// Create factory over cache
    #[inline]
    #[must_use]
    pub fn new(cache: Arc<ArchetypeCache>) -> Self {
        Self {
            cache,
            created: AtomicU64::new(0),
        }
    }

    /// Underlying archetype cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ArchetypeCache> {
        &self.cache
    }

    /// Number of instances produced so far
    #[inline]
    #[must_use]
    pub fn instances_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Clone the whole archetype tree and bind the blackboard
    ///
    /// # Errors
    /// - `LibraryError::InvalidArgument`, `Load`, `Cancelled` from the cache
    /// - `LibraryError::CloneFailed` if any task cannot be cloned
    pub fn create_tree<B>(
        &self,
        reference: &str,
        blackboard: Option<B>,
    ) -> Result<Tree<B>, LibraryError> {
        let archetype = self.cache.get(reference)?;
        let mut tree = instantiate(&archetype).map_err(|source| LibraryError::CloneFailed {
            reference: TreeRef::from_trusted(reference),
            source,
        })?;
        tree.bind_blackboard(blackboard);

        self.created.fetch_add(1, Ordering::Relaxed);
        if let Some(instance) = tree.instance_id() {
            tracing::trace!(reference, %instance, nodes = tree.node_count(), "tree instantiated");
        }
        Ok(tree)
    }

    /// Clone only the archetype's first root child
    ///
    /// Sibling subtrees are not copied and no blackboard is bound.
    ///
    /// # Errors
    /// - cache errors as for [`create_tree`](Self::create_tree)
    /// - `LibraryError::Structural` if the archetype has no root child
    /// - `LibraryError::CloneFailed` if any task cannot be cloned
    pub fn create_root_task(&self, reference: &str) -> Result<Node, LibraryError> {
        let archetype = self.cache.get(reference)?;
        let root = first_child(reference, &archetype)?;
        self.clone_root(reference, root)
    }

    /// Like [`create_root_task`](Self::create_root_task), requiring the root
    /// task to be of type `T`
    ///
    /// # Errors
    /// Additionally returns `LibraryError::TypeMismatch` if the root task is
    /// not a `T`.
    pub fn create_root_task_as<T: Task + 'static>(
        &self,
        reference: &str,
    ) -> Result<Node, LibraryError> {
        let archetype = self.cache.get(reference)?;
        let root = first_child(reference, &archetype)?;
        if !root.is::<T>() {
            return Err(LibraryError::TypeMismatch {
                reference: TreeRef::from_trusted(reference),
                expected: std::any::type_name::<T>(),
                actual: root.type_name(),
            });
        }
        self.clone_root(reference, root)
    }

    fn clone_root(&self, reference: &str, root: &Node) -> Result<Node, LibraryError> {
        let node = clone_subtree(root).map_err(|source| LibraryError::CloneFailed {
            reference: TreeRef::from_trusted(reference),
            source,
        })?;

        self.created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            reference,
            task = node.name(),
            nodes = node.node_count(),
            "root task instantiated"
        );
        Ok(node)
    }
}

fn first_child<'t>(reference: &str, archetype: &'t Tree) -> Result<&'t Node, LibraryError> {
    archetype
        .first_child()
        .map_err(|source| LibraryError::Structural {
            reference: TreeRef::from_trusted(reference),
            source,
        })
}

/// Deep-copy an archetype into a fresh, unbound instance
///
/// # Errors
/// Returns [`TaskCloneError`] if any task cannot be cloned.
pub fn instantiate<B>(archetype: &Tree) -> Result<Tree<B>, TaskCloneError> {
    let mut tree = Tree::new().with_instance_id(InstanceId::new());
    for child in archetype.children() {
        tree.add_child(clone_subtree(child)?);
    }
    Ok(tree)
}

/// Deep-copy a subtree
///
/// # Errors
/// Returns [`TaskCloneError`] if any task refuses to clone or clones into a
/// different variant.
pub fn clone_subtree(root: &Node) -> Result<Node, TaskCloneError> {
    let mut stack = vec![Frame::new(root)];
    let mut finished = None;

    while let Some(frame) = stack.last_mut() {
        if let Some(node) = finished.take() {
            frame.children.push(node);
        }
        let source = frame.source;
        if let Some(child) = source.children().get(frame.children.len()) {
            stack.push(Frame::new(child));
            continue;
        }
        if let Some(frame) = stack.pop() {
            finished = Some(frame.finish()?);
        }
    }

    finished.ok_or_else(|| TaskCloneError::failed(root.name(), "traversal produced no node"))
}

/// Source node plus the clones of its children produced so far
struct Frame<'a> {
    source: &'a Node,
    children: Vec<Node>,
}

impl<'a> Frame<'a> {
    fn new(source: &'a Node) -> Self {
        Self {
            source,
            children: Vec::with_capacity(source.child_count()),
        }
    }

    fn finish(self) -> Result<Node, TaskCloneError> {
        let task = clone_task_checked(self.source)?;
        Node::from_parts(task, self.children)
            .map_err(|e| TaskCloneError::failed(self.source.name(), e.to_string()))
    }
}

fn clone_task_checked(source: &Node) -> Result<Box<dyn Task>, TaskCloneError> {
    let original = source.task();
    let task = original.clone_task()?;
    let copy: &dyn Task = task.as_ref();

    if copy.as_any().type_id() != original.as_any().type_id() || copy.kind() != original.kind() {
        return Err(TaskCloneError::VariantMismatch {
            task: original.name().to_string(),
            expected: format!("{} ({})", original.type_name(), original.kind()),
            actual: format!("{} ({})", copy.type_name(), copy.kind()),
        });
    }
    Ok(task)
}
