//! Subscription Graph
//!
//! Maps an observed container to per-field dependency sets.
//!
//! # How It Works
//!
//! 1. A tracked read calls [`track`]. If a computation is active, the
//!    `(target, key)` dependency set is created on first use and the
//!    computation is added to it. The set is also recorded on the
//!    computation so it can leave again.
//!
//! 2. A write calls [`trigger`], which snapshots the subscribers of the
//!    affected sets and notifies each of them outside of any lock.
//!
//! 3. Before a computation re-runs (and when it stops) it leaves every set it
//!    recorded. A set that ends up empty is pruned from the graph.
//!
//! # Ownership
//!
//! The graph is keyed by [`TargetId`], never by a strong handle, so it does
//! not keep containers alive. Dropping the last handle to a container sweeps
//! its entry. Dependency sets hold their subscribers strongly; subscribers
//! only hold weak references back to the sets.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use super::value::{Object, TargetId};

/// The location inside a container that a read depended on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A named field.
    Field(Arc<str>),
    /// The container's key set (iteration, length, membership of new keys).
    Iterate,
}

impl TrackKey {
    pub fn field(name: &str) -> Self {
        TrackKey::Field(Arc::from(name))
    }
}

/// The set of computations subscribed to one `(target, key)` location.
pub struct Dep {
    target: TargetId,
    key: TrackKey,
    subscribers: Mutex<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl Dep {
    fn new(target: TargetId, key: TrackKey) -> Self {
        Self {
            target,
            key,
            subscribers: Mutex::new(IndexMap::new()),
        }
    }

    /// Add a subscriber. Returns `false` if it was already present.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), subscriber);
        true
    }

    /// Remove a subscriber, pruning this set from the graph once empty.
    pub(crate) fn unsubscribe(self: &Arc<Self>, id: SubscriberId) {
        let (removed, now_empty) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.shift_remove(&id);
            (removed, subscribers.is_empty())
        };
        // Dropped outside the lock: the subscriber may own the last handle to
        // a container, whose drop re-enters the graph.
        drop(removed);

        if now_empty {
            prune(self);
        }
    }

    /// Subscribers in subscription order, detached from the live set.
    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// The container this set belongs to.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// The key this set belongs to.
    pub fn key(&self) -> &TrackKey {
        &self.key
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("subscribers", &self.len())
            .finish()
    }
}

// Global subscription graph. Per-target entries are only ever touched
// through short, non-nested DashMap accesses.
static TARGETS: OnceLock<DashMap<TargetId, HashMap<TrackKey, Arc<Dep>>>> = OnceLock::new();

fn targets() -> &'static DashMap<TargetId, HashMap<TrackKey, Arc<Dep>>> {
    TARGETS.get_or_init(DashMap::new)
}

/// Record a read of `key` on `target` by the active computation, if any.
pub fn track(target: TargetId, key: TrackKey) {
    let Some(active) = ReactiveContext::current() else {
        return;
    };
    if !active.is_active() {
        return;
    }

    let dep = {
        let mut entry = targets().entry(target).or_default();
        Arc::clone(
            entry
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Dep::new(target, key))),
        )
    };

    if dep.subscribe(Arc::clone(&active)) {
        tracing::trace!(target_id = target.raw(), key = ?dep.key, subscriber = active.id().raw(), "track");
        active.record_dependency(&dep);
    }
}

/// Notify every computation subscribed to `key` on `target`.
pub fn trigger(target: TargetId, key: &TrackKey) {
    trigger_keys(target, std::slice::from_ref(key));
}

/// Notify the union of the subscribers of several keys, each once.
pub(crate) fn trigger_keys(target: TargetId, keys: &[TrackKey]) {
    let deps: Vec<Arc<Dep>> = match targets().get(&target) {
        Some(entry) => keys.iter().filter_map(|key| entry.get(key).cloned()).collect(),
        None => return,
    };
    if deps.is_empty() {
        return;
    }

    let mut pending: IndexMap<SubscriberId, Arc<dyn Subscriber>> = IndexMap::new();
    for dep in &deps {
        for subscriber in dep.snapshot() {
            pending.entry(subscriber.id()).or_insert(subscriber);
        }
    }

    let current = ReactiveContext::current_subscriber();
    tracing::trace!(target_id = target.raw(), ?keys, subscribers = pending.len(), "trigger");

    for (id, subscriber) in pending {
        // A computation writing a location it just read must not re-enter
        // itself.
        if Some(id) == current {
            continue;
        }
        subscriber.notify();
    }
}

/// Number of computations subscribed to `key` on `object`.
pub fn subscriber_count(object: &Object, key: &TrackKey) -> usize {
    targets()
        .get(&object.id())
        .and_then(|entry| entry.get(key).map(|dep| dep.len()))
        .unwrap_or(0)
}

/// Number of keys with live dependency sets on `object`.
pub fn tracked_key_count(object: &Object) -> usize {
    targets().get(&object.id()).map(|entry| entry.len()).unwrap_or(0)
}

/// Drop all bookkeeping for a container that is going away.
pub(crate) fn release_target(target: TargetId) {
    let Some(targets) = TARGETS.get() else {
        return;
    };
    // The removed entry is dropped after the shard lock is released.
    let removed = targets.remove(&target);
    drop(removed);
}

fn prune(dep: &Arc<Dep>) {
    let removed = {
        let Some(mut entry) = targets().get_mut(&dep.target) else {
            return;
        };
        let still_ours = entry
            .get(&dep.key)
            .is_some_and(|current| Arc::ptr_eq(current, dep) && current.is_empty());
        if still_ours {
            entry.remove(&dep.key)
        } else {
            None
        }
    };
    drop(removed);
    targets().remove_if(&dep.target, |_, entry| entry.is_empty());
}
