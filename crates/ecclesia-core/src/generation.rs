//! Generation tokens for discarding stale results
//!
//! Every run that will eventually publish into a [`ResultSlot`] first takes
//! a [`Generation`] from it. Only the most recently issued generation may
//! publish; a slower, older run that finishes late is dropped.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Monotonic sequence number tagging one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Latest-wins storage for one displayed value
#[derive(Debug)]
pub struct ResultSlot<T> {
    issued: AtomicU64,
    value: RwLock<Option<(Generation, T)>>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            value: RwLock::new(None),
        }
    }
}

impl<T: Clone> ResultSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation; every earlier one becomes stale
    pub fn begin(&self) -> Generation {
        Generation(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.issued.load(Ordering::SeqCst) == generation.0
    }

    /// Store `value` if `generation` is still the latest issued
    ///
    /// Returns `false` and drops the value when a newer run has started.
    pub fn publish(&self, generation: Generation, value: T) -> bool {
        let mut slot = self.value.write().unwrap_or_else(|e| e.into_inner());
        if !self.is_current(generation) {
            log::warn!("discarding stale result from {}", generation);
            return false;
        }
        *slot = Some((generation, value));
        true
    }

    /// The last published value
    pub fn current(&self) -> Option<T> {
        self.value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, v)| v.clone())
    }

    /// Generation that produced the last published value
    pub fn published_generation(&self) -> Option<Generation> {
        self.value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(g, _)| *g)
    }
}
