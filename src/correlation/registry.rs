//! Bounded, concurrent registry of live correlation handlers.
//!
//! Handlers are keyed by [`HandlerId`] in a [`DashMap`] and stamped with a
//! registration sequence. Lookups return the matching handler with the lowest
//! sequence, so the first registered handler wins when several match. When
//! the registry grows past its capacity the oldest tenth of the entries is
//! evicted, bounding memory held by scenarios that never stop correlating.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use log::{debug, warn};

use super::{CorrelationHandler, HandlerId};
use crate::{execution::ExecutionId, message::Message, metrics};

/// Default maximum number of live handlers.
pub const DEFAULT_CORRELATION_CAPACITY: usize = 1000;

struct Registered {
    sequence: u64,
    handler: Arc<CorrelationHandler>,
}

/// Concurrent registry of [`CorrelationHandler`]s.
pub struct CorrelationHandlerRegistry {
    handlers: DashMap<HandlerId, Registered>,
    sequence: AtomicU64,
    capacity: usize,
}

impl Default for CorrelationHandlerRegistry {
    fn default() -> Self { Self::with_capacity(DEFAULT_CORRELATION_CAPACITY) }
}

impl CorrelationHandlerRegistry {
    /// Create a registry holding at most `capacity` handlers (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handlers: DashMap::new(),
            sequence: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }

    /// Number of live handlers.
    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Register `handler`. Registering the same handler twice is a no-op.
    ///
    /// Returns `true` if the handler was newly inserted.
    pub fn register(&self, handler: Arc<CorrelationHandler>) -> bool {
        let id = handler.id();
        match self.handlers.entry(id) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "correlation handler registered: handler={id}, scenario={}, execution={}",
                    handler.scenario(),
                    handler.execution_id()
                );
                slot.insert(Registered { sequence, handler });
            }
        }
        if self.handlers.len() > self.capacity {
            self.evict_oldest();
        }
        metrics::set_correlation_handlers(self.handlers.len());
        true
    }

    fn evict_oldest(&self) {
        let mut entries: Vec<(u64, HandlerId)> = self
            .handlers
            .iter()
            .map(|entry| (entry.value().sequence, *entry.key()))
            .collect();
        let excess = entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        entries.sort_unstable();
        let count = (excess + (self.capacity / 10).max(1)).min(entries.len());
        for (_, id) in entries.into_iter().take(count) {
            self.handlers.remove(&id);
        }
        warn!(
            "correlation registry over capacity: evicted={count}, capacity={}",
            self.capacity
        );
    }

    /// Remove `handler`. Absent handlers are ignored.
    ///
    /// Returns `true` if the handler was present.
    pub fn remove(&self, handler: &CorrelationHandler) -> bool {
        let removed = self.handlers.remove(&handler.id()).is_some();
        if removed {
            debug!("correlation handler removed: handler={}", handler.id());
            metrics::set_correlation_handlers(self.handlers.len());
        }
        removed
    }

    /// Remove every handler owned by `execution_id`.
    ///
    /// Returns the number of handlers removed.
    pub fn remove_all_for(&self, execution_id: ExecutionId) -> usize {
        let before = self.handlers.len();
        self.handlers
            .retain(|_, entry| entry.handler.execution_id() != execution_id);
        let removed = before.saturating_sub(self.handlers.len());
        if removed > 0 {
            metrics::set_correlation_handlers(self.handlers.len());
        }
        removed
    }

    /// Find the earliest-registered handler whose conditions match `message`.
    ///
    /// The handler stays registered; removal is explicit.
    #[must_use]
    pub fn find_handler_for(&self, message: &Message) -> Option<Arc<CorrelationHandler>> {
        self.handlers
            .iter()
            .filter(|entry| entry.value().handler.is_handler_for(message))
            .min_by_key(|entry| entry.value().sequence)
            .map(|entry| Arc::clone(&entry.value().handler))
    }
}

impl std::fmt::Debug for CorrelationHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationHandlerRegistry")
            .field("len", &self.handlers.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
