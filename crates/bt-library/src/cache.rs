//! Single-flight archetype cache
//!
//! Maps references to immutable archetype trees. Each entry is either
//! `Ready` (archetype installed) or `Pending` (a load is in flight); absence
//! means neither. Concurrent misses for the same reference collapse into one
//! loader call whose outcome is delivered to every caller that joined it.
//!
//! ```text
//! Absent ──get──▶ Pending ──ok──▶ Ready ◀──register── (any state)
//!                    │
//!                    └──err/abandoned──▶ Absent (next get retries)
//! ```
//!
//! Transitions happen under the per-key shard lock of a [`DashMap`]; the
//! loader itself always runs with no lock held.

use crate::config::LibraryConfig;
use crate::error::{LibraryError, LoadError};
use crate::loader::{ArchetypeLoader, NoLoader};
use crate::reference::TreeRef;
use bt_task::Tree;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Outcome = Result<Arc<Tree>, LibraryError>;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of ready archetypes
    pub archetypes: usize,
    /// Lookups answered from a ready entry
    pub hits: u64,
    /// Loader invocations
    pub loads: u64,
    /// Loader invocations that failed
    pub load_failures: u64,
    /// Lookups that joined another caller's in-flight load
    pub coalesced_waits: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    coalesced_waits: AtomicU64,
}

#[derive(Debug)]
enum Slot {
    Ready(Arc<Tree>),
    Pending(Arc<Flight>),
}

/// Shared outcome of one in-flight load
#[derive(Debug, Default)]
struct Flight {
    outcome: Mutex<Option<Outcome>>,
    settled: Condvar,
}

impl Flight {
    /// Publish outcome and wake all waiters; first outcome wins
    fn settle(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
        drop(slot);
        self.settled.notify_all();
    }

    /// Block until settled or until the timeout elapses
    fn wait(&self, reference: &TreeRef, timeout: Option<Duration>) -> Outcome {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            match deadline {
                None => self.settled.wait(&mut outcome),
                Some(deadline) => {
                    if self.settled.wait_until(&mut outcome, deadline).timed_out() {
                        return (*outcome).clone().unwrap_or_else(|| {
                            Err(LibraryError::cancelled(
                                reference.clone(),
                                "timed out waiting for in-flight load",
                            ))
                        });
                    }
                }
            }
        }
    }
}

enum Action {
    Hit(Arc<Tree>),
    Join(Arc<Flight>),
    Lead(Arc<Flight>),
}

/// Settles the flight if the leader unwinds out of the loader
struct LoadGuard<'a> {
    cache: &'a ArchetypeCache,
    reference: &'a TreeRef,
    flight: Arc<Flight>,
    settled: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                reference = %self.reference,
                "archetype load abandoned, releasing waiters"
            );
            self.cache.settle(
                self.reference,
                &self.flight,
                Err(LibraryError::cancelled(
                    self.reference.clone(),
                    "loader panicked",
                )),
            );
        }
    }
}

/// Memoizing archetype cache with single-flight loads
///
/// Archetypes live for the lifetime of the cache; there is no eviction.
pub struct ArchetypeCache {
    entries: DashMap<TreeRef, Slot>,
    loader: Arc<dyn ArchetypeLoader>,
    wait_timeout: Option<Duration>,
    counters: Counters,
}

impl ArchetypeCache {
    /// Create cache backed by loader
    #[must_use]
    pub fn new(loader: impl ArchetypeLoader + 'static) -> Self {
        Self {
            entries: DashMap::new(),
            loader: Arc::new(loader),
            wait_timeout: None,
            counters: Counters::default(),
        }
    }

    /// Create cache backed by loader, configured
    #[must_use]
    pub fn with_config(loader: impl ArchetypeLoader + 'static, config: &LibraryConfig) -> Self {
        Self::new(loader).with_wait_timeout(config.load_wait_timeout())
    }

    /// Create cache that only serves registered archetypes
    #[must_use]
    pub fn registry_only() -> Self {
        Self::new(NoLoader)
    }

    /// Bound how long callers wait on another caller's load
    #[inline]
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Install or replace the archetype for reference
    ///
    /// Supersedes any load in flight for the same reference: its result is
    /// still handed to the callers waiting on it, but is not installed.
    ///
    /// # Errors
    /// Returns `LibraryError::InvalidArgument` for an empty reference; the
    /// cache is left untouched.
    pub fn register(&self, reference: &str, archetype: Tree) -> Result<(), LibraryError> {
        let reference = TreeRef::parse(reference)?;
        let nodes = archetype.node_count();

        match self
            .entries
            .insert(reference.clone(), Slot::Ready(Arc::new(archetype)))
        {
            Some(Slot::Pending(_)) => {
                tracing::debug!(
                    %reference,
                    nodes,
                    "registered archetype supersedes in-flight load"
                );
            }
            Some(Slot::Ready(_)) => {
                tracing::debug!(%reference, nodes, "archetype replaced");
            }
            None => {
                tracing::debug!(%reference, nodes, "archetype registered");
            }
        }
        Ok(())
    }

    /// Check if a ready archetype exists for reference
    ///
    /// Never waits on an in-flight load.
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.entries
            .get(reference)
            .is_some_and(|slot| matches!(*slot, Slot::Ready(_)))
    }

    /// Get archetype, loading it on first miss
    ///
    /// Returns immediately for ready entries. On a miss the calling thread
    /// either runs the loader or, if another caller already does, waits for
    /// that load and shares its outcome.
    ///
    /// A loader must not request the reference it is currently loading.
    ///
    /// # Errors
    /// - `LibraryError::InvalidArgument` for an empty reference
    /// - `LibraryError::Load` if the loader fails (not cached; the next call
    ///   retries)
    /// - `LibraryError::Cancelled` if the wait timed out or the loading
    ///   caller panicked
    pub fn get(&self, reference: &str) -> Result<Arc<Tree>, LibraryError> {
        if let Some(tree) = self.ready(reference) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(reference, "archetype hit");
            return Ok(tree);
        }

        let reference = TreeRef::parse(reference)?;
        let action = match self.entries.entry(reference.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(tree) => Action::Hit(Arc::clone(tree)),
                Slot::Pending(flight) => Action::Join(Arc::clone(flight)),
            },
            Entry::Vacant(entry) => {
                let flight = Arc::new(Flight::default());
                entry.insert(Slot::Pending(Arc::clone(&flight)));
                Action::Lead(flight)
            }
        };

        match action {
            Action::Hit(tree) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(tree)
            }
            Action::Join(flight) => {
                self.counters.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%reference, "joining in-flight archetype load");
                let outcome = flight.wait(&reference, self.wait_timeout);
                if let Err(LibraryError::Cancelled { reason, .. }) = &outcome {
                    tracing::warn!(%reference, %reason, "gave up waiting for archetype load");
                }
                outcome
            }
            Action::Lead(flight) => self.load(&reference, flight),
        }
    }

    /// References of all ready archetypes, sorted
    #[must_use]
    pub fn references(&self) -> Vec<TreeRef> {
        let mut refs: Vec<TreeRef> = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Ready(_)))
            .map(|entry| entry.key().clone())
            .collect();
        refs.sort();
        refs
    }

    /// Number of ready archetypes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Ready(_)))
            .count()
    }

    /// Check if no archetype is ready
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            archetypes: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            coalesced_waits: self.counters.coalesced_waits.load(Ordering::Relaxed),
        }
    }

    fn ready(&self, reference: &str) -> Option<Arc<Tree>> {
        self.entries.get(reference).and_then(|slot| match &*slot {
            Slot::Ready(tree) => Some(Arc::clone(tree)),
            Slot::Pending(_) => None,
        })
    }

    /// Run the loader as flight leader and publish its outcome
    fn load(&self, reference: &TreeRef, flight: Arc<Flight>) -> Outcome {
        let mut guard = LoadGuard {
            cache: self,
            reference,
            flight,
            settled: false,
        };

        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%reference, "archetype miss, loading");
        let started = Instant::now();

        let outcome = match self.loader.load(reference) {
            Ok(tree) => {
                tracing::debug!(
                    %reference,
                    nodes = tree.node_count(),
                    elapsed_ms = elapsed_ms(started),
                    "archetype loaded"
                );
                Ok(Arc::new(tree))
            }
            Err(cause) => {
                self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                let err = LoadError::new(reference.clone(), cause);
                tracing::warn!(
                    %reference,
                    error = %err.cause,
                    elapsed_ms = elapsed_ms(started),
                    "archetype load failed"
                );
                Err(LibraryError::Load(err))
            }
        };

        guard.settled = true;
        self.settle(reference, &guard.flight, outcome.clone());
        outcome
    }

    /// Resolve a pending entry, unless a `register` replaced it meanwhile
    fn settle(&self, reference: &TreeRef, flight: &Arc<Flight>, outcome: Outcome) {
        if let Entry::Occupied(mut entry) = self.entries.entry(reference.clone()) {
            let ours =
                matches!(entry.get(), Slot::Pending(pending) if Arc::ptr_eq(pending, flight));
            if ours {
                match &outcome {
                    Ok(tree) => {
                        entry.insert(Slot::Ready(Arc::clone(tree)));
                    }
                    Err(_) => {
                        entry.remove();
                    }
                }
            } else {
                tracing::debug!(%reference, "load result superseded by registered archetype");
            }
        }
        flight.settle(outcome);
    }
}

impl Default for ArchetypeCache {
    fn default() -> Self {
        Self::registry_only()
    }
}

impl fmt::Debug for ArchetypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeCache")
            .field("archetypes", &self.len())
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
