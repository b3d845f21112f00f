//! Snapshot Cache
//!
//! Holds zero or one computed snapshot. Computation happens at most once per
//! invalidation, under the write lock; failures are never cached.

use std::sync::{Arc, PoisonError, RwLock};

use crate::types::Result;

pub struct SnapshotCache<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotCache<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Cached snapshot, or the result of `compute` stored for next time
    pub fn get_or_try_init<F>(&self, compute: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.cached() {
            return Ok(hit);
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the slot while we waited
        if let Some(hit) = slot.as_ref() {
            return Ok(Arc::clone(hit));
        }
        let fresh = Arc::new(compute()?);
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn cached(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
    }

    /// Drop the snapshot; a no-op when nothing is cached
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached().is_some()
    }
}
