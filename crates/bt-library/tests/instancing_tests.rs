//! Functional tests for clone-based instancing.
//!
//! Core guarantees exercised here:
//! - Every instance is isomorphic to its archetype and carries its own
//!   blackboard.
//! - Instances share configuration but never execution state, with each
//!   other or with the archetype.
//! - Concurrent instancing of one reference never interferes.
//! - Root-task instancing copies the first top-level subtree only.
//! - Instancing failures leave the cached archetype untouched.

use bt_library::{BehaviorTreeLibrary, LibraryError};
use bt_task::{Node, Status, Tree};
use bt_test_utils::{
    patrol_root, patrol_tree, CountingLoader, MoveTo, Selector, Sequence, Unclonable, Wait,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const PATROL: &str = "ai/patrol";

fn patrol_library() -> (BehaviorTreeLibrary, Arc<CountingLoader>) {
    let loader = Arc::new(CountingLoader::new(patrol_tree));
    (BehaviorTreeLibrary::new(Arc::clone(&loader)), loader)
}

fn names(node: &Node) -> Vec<&str> {
    node.iter().map(Node::name).collect()
}

/// Two NPCs built from one reference get isomorphic trees and their own
/// contexts, from a single load.
#[test]
fn instances_are_isomorphic_with_own_context() {
    let (library, loader) = patrol_library();

    let first = library.create_tree(PATROL, Some(42u32)).unwrap();
    let second = library.create_tree(PATROL, Some(7u32)).unwrap();
    let archetype = library.cache().get(PATROL).unwrap();

    assert!(first.is_isomorphic(&*archetype));
    assert!(second.is_isomorphic(&first));
    assert_eq!(first.blackboard(), Some(&42));
    assert_eq!(second.blackboard(), Some(&7));
    assert_eq!(
        names(first.first_child().unwrap()),
        vec!["sequence", "moveTo", "wait"]
    );
    assert_ne!(first.instance_id(), second.instance_id());
    assert!(first.instance_id().is_some());
    assert_eq!(archetype.instance_id(), None);

    assert_eq!(loader.calls(), 1);
    assert_eq!(library.stats().instances_created, 2);
}

/// Mutating one instance is invisible to siblings and to the archetype.
#[test]
fn instances_do_not_share_state() {
    let (library, _) = patrol_library();
    let mut first = library.create_tree::<()>(PATROL, None).unwrap();
    let second = library.create_tree::<()>(PATROL, None).unwrap();

    {
        let root = first.first_child_mut().unwrap();
        root.set_status(Status::Running);
        let walk = root.child_mut(0).unwrap().downcast_mut::<MoveTo>().unwrap();
        walk.travelled = 3.5;
    }
    first.set_status(Status::Running);

    let archetype = library.cache().get(PATROL).unwrap();
    for tree in [&second, &*archetype] {
        let root = tree.first_child().unwrap();
        assert_eq!(tree.status(), Status::Fresh);
        assert_eq!(root.status(), Status::Fresh);
        assert_eq!(root.child(0).unwrap().downcast_ref::<MoveTo>().unwrap().travelled, 0.0);
    }

    let config_of = |tree: &Tree| {
        Arc::clone(
            &tree.first_child().unwrap().child(0).unwrap().downcast_ref::<MoveTo>().unwrap().config,
        )
    };
    assert!(Arc::ptr_eq(&config_of(&first), &config_of(&second)));
    assert!(Arc::ptr_eq(&config_of(&first), &config_of(&*archetype)));
}

/// Threads instancing the same reference each get their own tree, even
/// while the others mutate theirs.
#[test]
fn concurrent_instances_stay_independent() {
    const THREADS: usize = 16;
    let (library, loader) = patrol_library();
    let library = &library;

    let trees: Vec<Tree<usize>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                s.spawn(move || {
                    let mut tree = library.create_tree(PATROL, Some(i)).unwrap();
                    let walk = tree
                        .first_child_mut()
                        .unwrap()
                        .child_mut(0)
                        .unwrap()
                        .downcast_mut::<MoveTo>()
                        .unwrap();
                    walk.travelled = i as f32;
                    tree
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (i, tree) in trees.iter().enumerate() {
        assert_eq!(tree.blackboard(), Some(&i));
        let walk = tree.first_child().unwrap().child(0).unwrap();
        assert_eq!(walk.downcast_ref::<MoveTo>().unwrap().travelled, i as f32);
    }
    let archetype = library.cache().get(PATROL).unwrap();
    let walk = archetype.first_child().unwrap().child(0).unwrap();
    assert_eq!(walk.downcast_ref::<MoveTo>().unwrap().travelled, 0.0);

    assert_eq!(loader.calls(), 1);
    assert_eq!(library.stats().instances_created, THREADS as u64);
}

/// Dropping an instance leaves the archetype usable.
#[test]
fn dropping_instances_keeps_archetype() {
    let (library, loader) = patrol_library();
    drop(library.create_tree(PATROL, Some("npc")).unwrap());
    assert!(library.contains(PATROL));
    assert!(library.create_tree(PATROL, Some("npc")).is_ok());
    assert_eq!(loader.calls(), 1);
}

/// Root-task instancing ignores top-level siblings of the root task.
#[test]
fn root_task_copies_first_subtree_only() {
    let library = BehaviorTreeLibrary::registry_only();
    let archetype = Tree::with_root(patrol_root()).with_child(Node::new(Wait::new(5)));
    assert_eq!(archetype.node_count(), 4);
    library.register("npc/guard", archetype).unwrap();

    let root = library.create_root_task("npc/guard").unwrap();
    assert_eq!(root.node_count(), 3);
    assert_eq!(names(&root), vec!["sequence", "moveTo", "wait"]);
    assert!(root.is::<Sequence>());
}

/// Typed root-task instancing checks the root type before cloning.
#[test]
fn root_task_type_is_checked() {
    let (library, _) = patrol_library();
    assert!(library.create_root_task_as::<Sequence>(PATROL).is_ok());

    let err = library.create_root_task_as::<Selector>(PATROL).unwrap_err();
    match &err {
        LibraryError::TypeMismatch { expected, actual, .. } => {
            assert!(expected.ends_with("Selector"));
            assert!(actual.ends_with("Sequence"));
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
    assert!(err.is_caller_misuse());
    assert_eq!(library.stats().instances_created, 1);
}

/// An archetype without top-level nodes cannot yield a root task.
#[test]
fn empty_archetype_is_structural_error() {
    let library = BehaviorTreeLibrary::registry_only();
    library.register("empty", Tree::new()).unwrap();

    assert!(matches!(
        library.create_root_task("empty"),
        Err(LibraryError::Structural { .. })
    ));
    let whole = library.create_tree::<()>("empty", None).unwrap();
    assert_eq!(whole.child_count(), 0);
}

/// A task that cannot clone fails the instance and nothing else.
#[test]
fn clone_failure_leaves_archetype_cached() {
    let library = BehaviorTreeLibrary::registry_only();
    let root = Node::new(Sequence::default())
        .with_child(Node::new(Unclonable))
        .unwrap();
    library.register("broken", Tree::with_root(root)).unwrap();

    let err = library.create_tree::<()>("broken", None).unwrap_err();
    assert!(matches!(err, LibraryError::CloneFailed { .. }));
    assert!(!err.is_retryable());
    assert!(library.contains("broken"));
    assert_eq!(library.stats().instances_created, 0);
}

/// Blank references are rejected before reaching the loader.
#[test]
fn blank_reference_is_invalid() {
    let (library, loader) = patrol_library();
    for reference in ["", "   "] {
        let err = library.create_tree::<()>(reference, None).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidArgument { .. }));
    }
    assert_eq!(loader.calls(), 0);
}

/// Build a tree from a parent list: node `i + 1` hangs under
/// `parents[i] % (i + 1)`.
fn tree_from_parents(parents: &[usize]) -> Tree {
    let count = parents.len() + 1;
    let mut children = vec![Vec::new(); count];
    for (i, parent) in parents.iter().enumerate() {
        children[parent % (i + 1)].push(i + 1);
    }
    Tree::with_root(build(0, &children))
}

fn build(index: usize, children: &[Vec<usize>]) -> Node {
    if children[index].is_empty() {
        return if index % 2 == 0 {
            Node::new(MoveTo::new(index as i32, 0))
        } else {
            Node::new(Wait::new(index as u64))
        };
    }
    let mut node = Node::new(Sequence::default());
    for &child in &children[index] {
        node.add_child(build(child, children)).unwrap();
    }
    node
}

proptest! {
    #[test]
    fn prop_instance_matches_archetype_shape(
        parents in proptest::collection::vec(any::<usize>(), 0..64)
    ) {
        let library = BehaviorTreeLibrary::registry_only();
        let archetype = tree_from_parents(&parents);
        let expected_nodes = archetype.node_count();
        library.register("random", archetype).unwrap();

        let instance = library.create_tree("random", Some(parents.len())).unwrap();
        let archetype = library.cache().get("random").unwrap();

        prop_assert!(instance.is_isomorphic(&*archetype));
        prop_assert_eq!(instance.node_count(), expected_nodes);
        prop_assert_eq!(
            names(instance.first_child().unwrap()),
            names(archetype.first_child().unwrap())
        );
        prop_assert_eq!(instance.blackboard(), Some(&parents.len()));
    }
}
