//! Behavior tree nodes
//!
//! A [`Node`] owns its task payload, its execution-time [`Status`] and its
//! children. Child links are arity-checked against the task's [`TaskKind`].

use crate::error::TreeError;
use crate::task::{Status, Task, TaskKind};

/// Node of a behavior tree
#[derive(Debug)]
pub struct Node {
    task: Box<dyn Task>,
    status: Status,
    children: Vec<Node>,
}

impl Node {
    /// Create childless node for task
    #[inline]
    #[must_use]
    pub fn new(task: impl Task + 'static) -> Self {
        Self::from_boxed(Box::new(task))
    }

    /// Create childless node from boxed task
    #[inline]
    #[must_use]
    pub fn from_boxed(task: Box<dyn Task>) -> Self {
        Self {
            task,
            status: Status::Fresh,
            children: Vec::new(),
        }
    }

    /// Assemble node from task and children
    ///
    /// # Errors
    /// Returns [`TreeError`] if the children violate the task's arity.
    pub fn from_parts(task: Box<dyn Task>, children: Vec<Node>) -> Result<Self, TreeError> {
        let mut node = Self::from_boxed(task);
        for child in children {
            node.add_child(child)?;
        }
        Ok(node)
    }

    /// Builder-style [`add_child`](Self::add_child)
    ///
    /// # Errors
    /// Returns [`TreeError`] if the task cannot accept another child.
    pub fn with_child(mut self, child: Node) -> Result<Self, TreeError> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Append child, enforcing task arity
    ///
    /// # Errors
    /// - `TreeError::LeafHasNoChildren` for leaf tasks
    /// - `TreeError::DecoratorArity` if a decorator already wraps a child
    pub fn add_child(&mut self, child: Node) -> Result<(), TreeError> {
        match self.kind() {
            TaskKind::Leaf => {
                return Err(TreeError::LeafHasNoChildren {
                    task: self.name().to_string(),
                })
            }
            TaskKind::Decorator if !self.children.is_empty() => {
                return Err(TreeError::DecoratorArity {
                    task: self.name().to_string(),
                })
            }
            _ => {}
        }
        self.children.push(child);
        Ok(())
    }

    /// Task payload
    #[inline]
    #[must_use]
    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    /// Mutable task payload
    #[inline]
    pub fn task_mut(&mut self) -> &mut dyn Task {
        self.task.as_mut()
    }

    /// Task name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.task().name()
    }

    /// Task kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.task().kind()
    }

    /// Concrete task type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.task().type_name()
    }

    /// Check concrete task type
    #[inline]
    #[must_use]
    pub fn is<T: Task + 'static>(&self) -> bool {
        self.task().as_any().is::<T>()
    }

    /// Downcast task payload
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Task + 'static>(&self) -> Option<&T> {
        self.task().as_any().downcast_ref::<T>()
    }

    /// Mutably downcast task payload
    #[inline]
    pub fn downcast_mut<T: Task + 'static>(&mut self) -> Option<&mut T> {
        self.task_mut().as_any_mut().downcast_mut::<T>()
    }

    /// Execution status
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Set execution status
    #[inline]
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Reset status and task state of the whole subtree
    pub fn reset(&mut self) {
        let mut stack: Vec<&mut Node> = vec![self];
        while let Some(node) = stack.pop() {
            node.status = Status::Fresh;
            node.task.reset();
            stack.extend(node.children.iter_mut());
        }
    }

    /// Child nodes
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Mutable child nodes
    #[inline]
    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    /// Child at index
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    /// Mutable child at index
    #[inline]
    pub fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children.get_mut(index)
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Depth-first pre-order traversal of this subtree
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth of this subtree (a single node has depth 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        max
    }

    /// Structural equality: same task types, names and kinds, same shape
    ///
    /// Execution state is ignored.
    #[must_use]
    pub fn is_isomorphic(&self, other: &Node) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.type_name() != b.type_name()
                || a.kind() != b.kind()
                || a.name() != b.name()
                || a.children.len() != b.children.len()
            {
                return false;
            }
            stack.extend(a.children.iter().zip(b.children.iter()));
        }
        true
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Unlink descendants iteratively so deep trees cannot overflow the stack
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Pre-order iterator over a subtree
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = &'a Node;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
