//! JSON behavior tree definitions
//!
//! A definition document has a single root node:
//!
//! ```json
//! {
//!   "root": {
//!     "task": "sequence",
//!     "children": [
//!       { "task": "moveTo", "params": { "x": 3, "y": 4 } },
//!       { "task": "wait", "params": { "ms": 500 } }
//!     ]
//!   }
//! }
//! ```
//!
//! Task names resolve through a [`TaskRegistry`] of constructors.

use crate::error::{BoxError, JsonLoadError};
use crate::loader::ArchetypeLoader;
use crate::reference::TreeRef;
use bt_task::{Node, Task, Tree};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Task parameters as written in the definition
pub type Params = Map<String, Value>;

/// Constructor for a named task
pub type TaskConstructor = Arc<dyn Fn(&Params) -> Result<Box<dyn Task>, BoxError> + Send + Sync>;

/// Tree definition document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeDef {
    /// Root task
    pub root: NodeDef,
}

/// Node definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDef {
    /// Registered task name
    pub task: String,
    /// Constructor parameters
    #[serde(default)]
    pub params: Params,
    /// Child definitions
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

/// Registry mapping task names to constructors
#[derive(Clone, Default)]
pub struct TaskRegistry {
    constructors: HashMap<String, TaskConstructor>,
}

impl TaskRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register constructor receiving raw parameters
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Params) -> Result<Box<dyn Task>, BoxError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    /// Register constructor receiving deserialized parameters
    pub fn register_typed<P, T, F>(&mut self, name: &str, constructor: F)
    where
        P: DeserializeOwned,
        T: Task + 'static,
        F: Fn(P) -> T + Send + Sync + 'static,
    {
        self.register(name, move |params: &Params| {
            let params: P = serde_json::from_value(Value::Object(params.clone()))?;
            Ok(Box::new(constructor(params)) as Box<dyn Task>)
        });
    }

    /// Check if task name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered task names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build archetype from definition
    ///
    /// # Errors
    /// - `JsonLoadError::UnknownTask` for unregistered task names
    /// - `JsonLoadError::Construct` if a constructor rejects its parameters
    /// - `JsonLoadError::Structure` if children violate task arity
    pub fn build(&self, def: &TreeDef) -> Result<Tree, JsonLoadError> {
        Ok(Tree::with_root(self.build_node(&def.root)?))
    }

    /// Build node subtree from definition
    ///
    /// # Errors
    /// As for [`build`](Self::build).
    pub fn build_node(&self, def: &NodeDef) -> Result<Node, JsonLoadError> {
        let constructor = self
            .constructors
            .get(&def.task)
            .ok_or_else(|| JsonLoadError::UnknownTask(def.task.clone()))?;
        let task = constructor(&def.params).map_err(|e| JsonLoadError::Construct {
            task: def.task.clone(),
            reason: e.to_string(),
        })?;

        let children = def
            .children
            .iter()
            .map(|child| self.build_node(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::from_parts(task, children)?)
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

/// Loader reading JSON definitions from a directory
///
/// The reference is a path relative to the definitions root.
#[derive(Debug, Clone)]
pub struct JsonTreeLoader {
    root: PathBuf,
    registry: Arc<TaskRegistry>,
}

impl JsonTreeLoader {
    /// Create loader for definitions root
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, registry: TaskRegistry) -> Self {
        Self {
            root: root.into(),
            registry: Arc::new(registry),
        }
    }

    /// Definitions root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Task registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Resolve reference to a file below the root
    ///
    /// # Errors
    /// Returns `JsonLoadError::InvalidPath` for absolute references or
    /// references containing `..`.
    pub fn resolve(&self, reference: &TreeRef) -> Result<PathBuf, JsonLoadError> {
        let relative = Path::new(reference.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(JsonLoadError::InvalidPath(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Parse archetype from an in-memory document
    ///
    /// # Errors
    /// Returns `JsonLoadError::Parse` for malformed documents, or any
    /// [`TaskRegistry::build`] error.
    pub fn parse_str(&self, source: &str) -> Result<Tree, JsonLoadError> {
        let def: TreeDef = serde_json::from_str(source)?;
        self.registry.build(&def)
    }

    /// Read and parse the definition for reference
    ///
    /// # Errors
    /// Any resolve, IO, parse or build error.
    pub fn load_definition(&self, reference: &TreeRef) -> Result<Tree, JsonLoadError> {
        let path = self.resolve(reference)?;
        let source =
            std::fs::read_to_string(&path).map_err(|e| JsonLoadError::io_error(&path, e))?;
        self.parse_str(&source)
    }
}

impl ArchetypeLoader for JsonTreeLoader {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        Ok(self.load_definition(reference)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_task::{TaskCloneError, TaskKind};
    use serde::Deserialize;

    #[derive(Debug)]
    struct Sequence;

    impl Task for Sequence {
        fn name(&self) -> &str {
            "sequence"
        }

        fn kind(&self) -> TaskKind {
            TaskKind::Composite
        }

        fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
            Ok(Box::new(Sequence))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Wait {
        ms: u64,
    }

    impl Task for Wait {
        fn name(&self) -> &str {
            "wait"
        }

        fn kind(&self) -> TaskKind {
            TaskKind::Leaf
        }

        fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
            Ok(Box::new(Wait { ms: self.ms }))
        }
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry.register("sequence", |_: &Params| Ok(Box::new(Sequence) as Box<dyn Task>));
        registry.register_typed("wait", |wait: Wait| wait);
        registry
    }

    fn loader() -> JsonTreeLoader {
        JsonTreeLoader::new("defs", registry())
    }

    #[test]
    fn parse_document() {
        let tree = loader()
            .parse_str(
                r#"{ "root": { "task": "sequence", "children": [
                    { "task": "wait", "params": { "ms": 250 } },
                    { "task": "wait", "params": { "ms": 500 } }
                ] } }"#,
            )
            .unwrap();

        let root = tree.first_child().unwrap();
        assert_eq!(root.name(), "sequence");
        assert_eq!(root.child_count(), 2);
        assert_eq!(root.child(1).and_then(|n| n.downcast_ref::<Wait>()).map(|w| w.ms), Some(500));
    }

    #[test]
    fn unknown_task() {
        let err = loader()
            .parse_str(r#"{ "root": { "task": "fly" } }"#)
            .unwrap_err();
        assert!(matches!(err, JsonLoadError::UnknownTask(name) if name == "fly"));
    }

    #[test]
    fn bad_params() {
        let err = loader()
            .parse_str(r#"{ "root": { "task": "wait", "params": { "ms": "soon" } } }"#)
            .unwrap_err();
        assert!(matches!(err, JsonLoadError::Construct { task, .. } if task == "wait"));
    }

    #[test]
    fn leaf_with_children() {
        let err = loader()
            .parse_str(
                r#"{ "root": { "task": "wait", "params": { "ms": 1 },
                   "children": [ { "task": "sequence" } ] } }"#,
            )
            .unwrap_err();
        assert!(matches!(err, JsonLoadError::Structure(_)));
    }

    #[test]
    fn resolve_rejects_escaping_references() {
        let loader = loader();
        assert!(loader.resolve(&TreeRef::from_trusted("ai/patrol.json")).is_ok());
        assert!(matches!(
            loader.resolve(&TreeRef::from_trusted("../secrets.json")),
            Err(JsonLoadError::InvalidPath(_))
        ));
        assert!(loader.resolve(&TreeRef::from_trusted("/etc/passwd")).is_err());
    }

    #[test]
    fn registry_names() {
        assert_eq!(registry().names(), vec!["sequence", "wait"]);
        assert!(registry().contains("wait"));
    }
}
