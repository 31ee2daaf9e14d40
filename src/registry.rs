use crate::error::Result;
use crate::restrictor::{Kind, Restrictor};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Ordered restrictor collection owned by one resource type.
///
/// Registration order is preserved and determines the stacking order used
/// during composition. Mutation is copy-on-write: composers take an
/// [`snapshot`](RestrictorRegistry::snapshot) and never observe a partially
/// updated list. Cloning the registry shares the same underlying list, which
/// is how a subtype's engine opts in to its parent's restrictors.
pub struct RestrictorRegistry<R, S> {
    inner: Arc<RwLock<Arc<Vec<Restrictor<R, S>>>>>,
}

impl<R, S> RestrictorRegistry<R, S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    /// Appends a restrictor, preserving registration order.
    pub fn push(&self, restrictor: Restrictor<R, S>) {
        let mut guard = self.inner.write().expect("poisoned lock");
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        debug!(name = %restrictor.name(), kind = ?restrictor.kind(), "restrictor registered");
        next.push(restrictor);
        *guard = Arc::new(next);
    }

    /// Atomically removes every registered restrictor.
    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("poisoned lock");
        debug!(count = guard.len(), "restrictor registry cleared");
        *guard = Arc::new(Vec::new());
    }

    /// Returns an immutable view of the current restrictor list.
    pub fn snapshot(&self) -> Arc<Vec<Restrictor<R, S>>> {
        Arc::clone(&self.inner.read().expect("poisoned lock"))
    }

    /// Returns the ordered subsequence of the given kind.
    ///
    /// Disabled restrictors are filtered out unless `include_disabled` is
    /// set; enablement is re-evaluated at call time and a failing flag
    /// propagates instead of being treated as disabled.
    pub fn by_kind(&self, kind: Kind, include_disabled: bool) -> Result<Vec<Restrictor<R, S>>> {
        let snapshot = self.snapshot();
        let mut matched = Vec::new();
        for restrictor in snapshot.iter() {
            if restrictor.kind() != kind {
                continue;
            }
            if include_disabled || restrictor.is_enabled()? {
                matched.push(restrictor.clone());
            }
        }
        Ok(matched)
    }

    /// Number of registered restrictors, regardless of enablement.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns whether the registry holds no restrictors.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl<R, S> Default for RestrictorRegistry<R, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, S> Clone for RestrictorRegistry<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, S> std::fmt::Debug for RestrictorRegistry<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestrictorRegistry")
            .field("restrictors", &self.snapshot())
            .finish()
    }
}
