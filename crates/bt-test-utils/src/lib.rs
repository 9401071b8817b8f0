//! Testing utilities for the behavior tree library workspace
//!
//! Shared test helpers, fixtures, and a small demo task vocabulary.

#![allow(missing_docs)]

use bt_library::{ArchetypeLoader, BoxError, Params, TaskRegistry, TreeRef};
use bt_task::{Node, Task, TaskCloneError, TaskKind, Tree};
use crossbeam::channel::{self, Receiver, Sender};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Demo tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Sequence {
    pub current: usize,
}

impl Task for Sequence {
    fn name(&self) -> &str {
        "sequence"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Ok(Box::new(Sequence::default()))
    }

    fn reset(&mut self) {
        self.current = 0;
    }
}

#[derive(Debug, Default)]
pub struct Selector {
    pub current: usize,
}

impl Task for Selector {
    fn name(&self) -> &str {
        "selector"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Composite
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Ok(Box::new(Selector::default()))
    }

    fn reset(&mut self) {
        self.current = 0;
    }
}

#[derive(Debug, Default)]
pub struct Inverter;

impl Task for Inverter {
    fn name(&self) -> &str {
        "invert"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Decorator
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Ok(Box::new(Inverter))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoveToConfig {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

/// Leaf with shared configuration and per-instance progress
#[derive(Debug)]
pub struct MoveTo {
    pub config: Arc<MoveToConfig>,
    pub travelled: f32,
}

impl MoveTo {
    pub fn new(x: i32, y: i32) -> Self {
        Self::from_config(MoveToConfig { x, y, speed: 1.0 })
    }

    pub fn from_config(config: MoveToConfig) -> Self {
        Self {
            config: Arc::new(config),
            travelled: 0.0,
        }
    }
}

impl Task for MoveTo {
    fn name(&self) -> &str {
        "moveTo"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Leaf
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Ok(Box::new(MoveTo {
            config: Arc::clone(&self.config),
            travelled: 0.0,
        }))
    }

    fn reset(&mut self) {
        self.travelled = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WaitConfig {
    pub ms: u64,
}

/// Leaf with copied configuration and per-instance elapsed time
#[derive(Debug)]
pub struct Wait {
    pub duration: Duration,
    pub elapsed: Duration,
}

impl Wait {
    pub fn new(ms: u64) -> Self {
        Self {
            duration: Duration::from_millis(ms),
            elapsed: Duration::ZERO,
        }
    }
}

impl Task for Wait {
    fn name(&self) -> &str {
        "wait"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Leaf
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Ok(Box::new(Wait {
            duration: self.duration,
            elapsed: Duration::ZERO,
        }))
    }

    fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

/// Leaf that refuses to clone
#[derive(Debug, Default)]
pub struct Unclonable;

impl Task for Unclonable {
    fn name(&self) -> &str {
        "unclonable"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Leaf
    }

    fn clone_task(&self) -> Result<Box<dyn Task>, TaskCloneError> {
        Err(TaskCloneError::unsupported("unclonable"))
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// root → sequence → {moveTo, wait}
pub fn patrol_root() -> Node {
    let mut sequence = Node::new(Sequence::default());
    sequence.add_child(Node::new(MoveTo::new(10, 20))).unwrap();
    sequence.add_child(Node::new(Wait::new(500))).unwrap();
    sequence
}

pub fn patrol_tree() -> Tree {
    Tree::with_root(patrol_root())
}

/// selector → {invert → moveTo, wait}
pub fn guard_tree() -> Tree {
    let invert = Node::new(Inverter)
        .with_child(Node::new(MoveTo::new(0, 0)))
        .unwrap();
    let selector = Node::new(Selector::default())
        .with_child(invert)
        .and_then(|n| n.with_child(Node::new(Wait::new(100))))
        .unwrap();
    Tree::with_root(selector)
}

/// Complete tree of sequences with `moveTo` leaves
pub fn balanced_tree(depth: usize, fanout: usize) -> Tree {
    Tree::with_root(balanced_node(depth, fanout))
}

fn balanced_node(depth: usize, fanout: usize) -> Node {
    if depth <= 1 {
        return Node::new(MoveTo::new(0, 0));
    }
    let mut node = Node::new(Sequence::default());
    for _ in 0..fanout {
        node.add_child(balanced_node(depth - 1, fanout)).unwrap();
    }
    node
}

/// Registry with the demo vocabulary
pub fn task_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register("sequence", |_: &Params| {
        Ok(Box::new(Sequence::default()) as Box<dyn Task>)
    });
    registry.register("selector", |_: &Params| {
        Ok(Box::new(Selector::default()) as Box<dyn Task>)
    });
    registry.register("invert", |_: &Params| Ok(Box::new(Inverter) as Box<dyn Task>));
    registry.register_typed("moveTo", MoveTo::from_config);
    registry.register_typed("wait", |config: WaitConfig| Wait::new(config.ms));
    registry
}

pub const PATROL_JSON: &str = r#"{
  "root": {
    "task": "sequence",
    "children": [
      { "task": "moveTo", "params": { "x": 10, "y": 20 } },
      { "task": "wait", "params": { "ms": 500 } }
    ]
  }
}"#;

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Loader counting its invocations
#[derive(Debug)]
pub struct CountingLoader {
    calls: AtomicUsize,
    fail_first: usize,
    delay: Duration,
    make: fn() -> Tree,
}

impl CountingLoader {
    pub fn new(make: fn() -> Tree) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            delay: Duration::ZERO,
            make,
        }
    }

    #[must_use]
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchetypeLoader for CountingLoader {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if call < self.fail_first {
            return Err(format!("'{reference}' unavailable (attempt {})", call + 1).into());
        }
        Ok((self.make)())
    }
}

/// What a [`ScriptedLoader`] does once released
#[derive(Debug)]
pub enum Script {
    Succeed(Tree),
    Fail(String),
    Panic,
}

/// Loader that blocks until the test releases it
#[derive(Debug)]
pub struct ScriptedLoader {
    calls: AtomicUsize,
    started: Sender<TreeRef>,
    scripts: Receiver<Script>,
}

/// Test-side handle of a [`ScriptedLoader`]
#[derive(Debug)]
pub struct LoaderControl {
    pub started: Receiver<TreeRef>,
    pub release: Sender<Script>,
}

impl ScriptedLoader {
    pub fn new() -> (Arc<Self>, LoaderControl) {
        let (started_tx, started_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        let loader = Arc::new(Self {
            calls: AtomicUsize::new(0),
            started: started_tx,
            scripts: release_rx,
        });
        let control = LoaderControl {
            started: started_rx,
            release: release_tx,
        };
        (loader, control)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchetypeLoader for ScriptedLoader {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started.send(reference.clone());
        match self.scripts.recv() {
            Ok(Script::Succeed(tree)) => Ok(tree),
            Ok(Script::Fail(message)) => Err(message.into()),
            Ok(Script::Panic) => panic!("scripted loader panic for '{reference}'"),
            Err(_) => Err("loader control dropped".into()),
        }
    }
}

/// Spin until `condition` holds or two seconds pass
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
