//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that can be registered in a dependency
//! set: plain effects, watchers and component render effects all end up here
//! as `Arc<dyn Subscriber>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::graph::Dep;

/// Unique identifier for a subscriber.
///
/// Dependency sets are keyed by this ID, which is what makes subscription
/// idempotent: reading the same field twice in one run registers once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be notified when a tracked location changes.
pub trait Subscriber: Send + Sync {
    /// The subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Whether the subscriber may still run. Stopped subscribers are inert.
    fn is_active(&self) -> bool;

    /// Remember that this subscriber sits in `dep`, so it can leave it
    /// before the next run or when stopped.
    fn record_dependency(&self, dep: &Arc<Dep>);

    /// A tracked location changed: either hand off to the custom scheduler
    /// or run right away.
    fn notify(&self);
}
