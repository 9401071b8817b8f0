//! Archetype loaders
//!
//! The library does not know how references resolve to resources or how
//! definitions are parsed. It only calls [`ArchetypeLoader::load`], at most
//! once per missing reference at a time.

use crate::error::BoxError;
use crate::reference::TreeRef;
use bt_task::Tree;
use std::fmt;
use std::sync::Arc;

/// Converts a reference into a fresh archetype tree
pub trait ArchetypeLoader: Send + Sync {
    /// Load the archetype for reference
    ///
    /// May block on I/O and parsing.
    ///
    /// # Errors
    /// Any failure to resolve, read or parse the resource.
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError>;
}

impl<L: ArchetypeLoader + ?Sized> ArchetypeLoader for Arc<L> {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        (**self).load(reference)
    }
}

impl<L: ArchetypeLoader + ?Sized> ArchetypeLoader for Box<L> {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        (**self).load(reference)
    }
}

/// Loader for libraries populated only through `register`
///
/// Every load fails, so every miss surfaces as a `LoadError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl ArchetypeLoader for NoLoader {
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        Err(format!("no loader configured, '{reference}' was never registered").into())
    }
}

/// Adapter turning a closure into a loader
///
/// Build with [`loader_fn`].
pub struct FnLoader<F> {
    f: F,
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").finish_non_exhaustive()
    }
}

impl<F> ArchetypeLoader for FnLoader<F>
where
    F: Fn(&TreeRef) -> Result<Tree, BoxError> + Send + Sync,
{
    fn load(&self, reference: &TreeRef) -> Result<Tree, BoxError> {
        (self.f)(reference)
    }
}

/// Wrap closure as [`ArchetypeLoader`]
#[inline]
#[must_use]
pub fn loader_fn<F>(f: F) -> FnLoader<F>
where
    F: Fn(&TreeRef) -> Result<Tree, BoxError> + Send + Sync,
{
    FnLoader { f }
}
