//! Behavior tree root
//!
//! [`Tree<B>`] is the root of a behavior tree. It owns the top-level nodes
//! and a blackboard slot of type `B`. Archetypes are unbound trees
//! (`Tree<()>`); instances are bound to whatever blackboard the caller
//! supplies.

use crate::error::TreeError;
use crate::node::Node;
use crate::task::Status;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a tree instance (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Ulid);

impl InstanceId {
    /// Generate new instance ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root of a behavior tree with a blackboard slot
#[derive(Debug)]
pub struct Tree<B = ()> {
    children: Vec<Node>,
    blackboard: Option<B>,
    status: Status,
    instance: Option<InstanceId>,
}

impl<B> Tree<B> {
    /// Create empty, unbound tree
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            blackboard: None,
            status: Status::Fresh,
            instance: None,
        }
    }

    /// Create tree with a single root task
    #[inline]
    #[must_use]
    pub fn with_root(root: Node) -> Self {
        Self::new().with_child(root)
    }

    /// Builder-style [`add_child`](Self::add_child)
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    /// Append a top-level node
    #[inline]
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Top-level nodes
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Mutable top-level nodes
    #[inline]
    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    /// Number of top-level nodes
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Designated root task (first child)
    ///
    /// # Errors
    /// Returns `TreeError::NoRootChild` if the tree is empty.
    pub fn first_child(&self) -> Result<&Node, TreeError> {
        self.children.first().ok_or(TreeError::NoRootChild)
    }

    /// Mutable designated root task
    ///
    /// # Errors
    /// Returns `TreeError::NoRootChild` if the tree is empty.
    pub fn first_child_mut(&mut self) -> Result<&mut Node, TreeError> {
        self.children.first_mut().ok_or(TreeError::NoRootChild)
    }

    /// Bound blackboard
    #[inline]
    #[must_use]
    pub fn blackboard(&self) -> Option<&B> {
        self.blackboard.as_ref()
    }

    /// Mutable bound blackboard
    #[inline]
    pub fn blackboard_mut(&mut self) -> Option<&mut B> {
        self.blackboard.as_mut()
    }

    /// Bind blackboard (plain assignment, `None` clears the slot)
    #[inline]
    pub fn bind_blackboard(&mut self, blackboard: Option<B>) {
        self.blackboard = blackboard;
    }

    /// Take blackboard out of the slot
    #[inline]
    pub fn take_blackboard(&mut self) -> Option<B> {
        self.blackboard.take()
    }

    /// Tree-level execution status
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Set tree-level execution status
    #[inline]
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Instance identity, `None` for archetypes
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance
    }

    /// Stamp instance identity
    #[inline]
    #[must_use]
    pub fn with_instance_id(mut self, id: InstanceId) -> Self {
        self.instance = Some(id);
        self
    }

    /// Total number of nodes below the root
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.children.iter().map(Node::node_count).sum()
    }

    /// Reset all execution state, keeping the blackboard
    pub fn reset(&mut self) {
        self.status = Status::Fresh;
        self.children.iter_mut().for_each(Node::reset);
    }

    /// Structural equality with another tree, ignoring blackboards and state
    #[must_use]
    pub fn is_isomorphic<C>(&self, other: &Tree<C>) -> bool {
        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.is_isomorphic(b))
    }
}

impl<B> Default for Tree<B> {
    fn default() -> Self {
        Self::new()
    }
}
