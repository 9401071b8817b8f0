//! Concurrency tests for the archetype cache.
//!
//! Core guarantees exercised here:
//! - Concurrent misses for one reference run the loader exactly once and
//!   every caller observes the same archetype.
//! - A failed load is delivered to every waiter and is not cached.
//! - Waiters can give up on a slow load without disturbing the leader.
//! - A `register` during a load wins over the loader's result.
//! - A panicking loader releases its waiters.

use bt_library::{ArchetypeCache, LibraryError};
use bt_test_utils::{
    guard_tree, init_tracing, patrol_tree, wait_until, CountingLoader, Script, ScriptedLoader,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const CALLERS: usize = 16;

/// Sixteen threads racing on a cold reference trigger one load.
#[test]
fn concurrent_misses_load_once() {
    init_tracing();
    let loader = Arc::new(CountingLoader::new(patrol_tree).with_delay(Duration::from_millis(50)));
    let cache = ArchetypeCache::new(Arc::clone(&loader));
    let barrier = Barrier::new(CALLERS);
    let (cache, barrier) = (&cache, &barrier);

    let trees: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                s.spawn(move || {
                    barrier.wait();
                    cache.get("ai/patrol")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert_eq!(loader.calls(), 1);
    assert!(trees.iter().all(|t| Arc::ptr_eq(t, &trees[0])));

    let stats = cache.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.archetypes, 1);
    assert_eq!(stats.hits + stats.coalesced_waits, (CALLERS - 1) as u64);
}

/// Distinct references load independently.
#[test]
fn distinct_references_load_separately() {
    let loader = Arc::new(CountingLoader::new(patrol_tree));
    let cache = ArchetypeCache::new(Arc::clone(&loader));

    thread::scope(|s| {
        for i in 0..CALLERS {
            let cache = &cache;
            s.spawn(move || {
                let reference = if i % 2 == 0 { "a" } else { "b" };
                cache.get(reference).unwrap();
            });
        }
    });

    assert_eq!(loader.calls(), 2);
    assert_eq!(cache.len(), 2);
}

/// Every waiter of a failed load receives the same error, and the next
/// lookup retries.
#[test]
fn failure_is_shared_then_retried() {
    init_tracing();
    let (loader, control) = ScriptedLoader::new();
    let cache = ArchetypeCache::new(Arc::clone(&loader));

    let shared = &cache;
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| s.spawn(move || shared.get("flaky")))
            .collect();

        control.started.recv().unwrap();
        assert!(wait_until(|| cache.stats().coalesced_waits == (CALLERS - 1) as u64));
        control.release.send(Script::Fail("disk on fire".into())).unwrap();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let errors: Vec<_> = results
        .into_iter()
        .map(|r| match r {
            Err(LibraryError::Load(e)) => e,
            other => panic!("expected load error, got {other:?}"),
        })
        .collect();
    assert!(errors.iter().all(|e| e.same_cause(&errors[0])));
    assert!(errors[0].to_string().contains("disk on fire"));
    assert_eq!(loader.calls(), 1);
    assert!(!cache.contains("flaky"));

    control.release.send(Script::Succeed(patrol_tree())).unwrap();
    assert!(cache.get("flaky").is_ok());
    assert_eq!(loader.calls(), 2);
    assert_eq!(cache.stats().load_failures, 1);
}

/// A waiter with a timeout gives up with `Cancelled`; the leader still
/// installs the archetype.
#[test]
fn waiter_times_out() {
    let (loader, control) = ScriptedLoader::new();
    let cache = ArchetypeCache::new(Arc::clone(&loader))
        .with_wait_timeout(Some(Duration::from_millis(30)));

    thread::scope(|s| {
        let leader = s.spawn(|| cache.get("slow"));
        control.started.recv().unwrap();

        let err = cache.get("slow").unwrap_err();
        assert!(matches!(err, LibraryError::Cancelled { .. }));
        assert!(err.is_retryable());

        control.release.send(Script::Succeed(patrol_tree())).unwrap();
        assert!(leader.join().unwrap().is_ok());
    });

    assert!(cache.contains("slow"));
    assert!(cache.get("slow").is_ok());
    assert_eq!(loader.calls(), 1);
}

/// Registering while a load is in flight replaces the pending entry; the
/// loader's late result is not installed.
#[test]
fn register_supersedes_inflight_load() {
    let (loader, control) = ScriptedLoader::new();
    let cache = ArchetypeCache::new(Arc::clone(&loader));

    thread::scope(|s| {
        let leader = s.spawn(|| cache.get("npc"));
        control.started.recv().unwrap();
        assert!(!cache.contains("npc"));

        cache.register("npc", guard_tree()).unwrap();
        control.release.send(Script::Succeed(patrol_tree())).unwrap();

        let loaded = leader.join().unwrap().unwrap();
        assert_eq!(loaded.first_child().unwrap().name(), "sequence");
    });

    let installed = cache.get("npc").unwrap();
    assert_eq!(installed.first_child().unwrap().name(), "selector");
    assert_eq!(loader.calls(), 1);
}

/// A loader panic cancels the waiters and leaves the reference absent.
#[test]
fn panicking_loader_releases_waiters() {
    let (loader, control) = ScriptedLoader::new();
    let cache = ArchetypeCache::new(Arc::clone(&loader));

    thread::scope(|s| {
        let leader = s.spawn(|| cache.get("cursed"));
        control.started.recv().unwrap();

        let waiter = s.spawn(|| cache.get("cursed"));
        assert!(wait_until(|| cache.stats().coalesced_waits == 1));
        control.release.send(Script::Panic).unwrap();

        assert!(leader.join().is_err());
        let err = waiter.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Cancelled { ref reason, .. } if reason == "loader panicked"
        ));
    });

    assert!(!cache.contains("cursed"));
    control.release.send(Script::Succeed(patrol_tree())).unwrap();
    assert!(cache.get("cursed").is_ok());
    assert_eq!(loader.calls(), 2);
}
