//! Reactive Proxy Layer
//!
//! [`Reactive`] is an instrumented view over an [`Object`]. Every accessor
//! goes through the subscription graph: reads call `track`, writes that
//! actually change something call `trigger`. The view never copies data;
//! all views of one container share its fields and its identity.
//!
//! Nested containers are wrapped lazily, when they are read, so wrapping a
//! large tree costs nothing up front.

use std::fmt;
use std::sync::Arc;

use super::graph::{self, TrackKey};
use super::value::{Object, TargetId, Value};

/// An instrumented view of a container.
#[derive(Clone)]
pub struct Reactive {
    target: Object,
}

impl Reactive {
    fn new(target: Object) -> Self {
        Self { target }
    }

    /// Identity of the underlying container.
    pub fn id(&self) -> TargetId {
        self.target.id()
    }

    /// Views over the same container are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        self.target.ptr_eq(&other.target)
    }

    /// Read a field. Nested containers come back wrapped.
    pub fn get(&self, key: &str) -> Value {
        graph::track(self.id(), TrackKey::field(key));
        to_reactive(self.target.get(key).unwrap_or_default())
    }

    /// Write a field, notifying readers when the value changed.
    ///
    /// Adding a field that did not exist also notifies readers of the key set.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into().into_raw();
        let previous = self.target.insert(key, value.clone());

        match previous {
            None => graph::trigger_keys(self.id(), &[TrackKey::field(key), TrackKey::Iterate]),
            Some(old) if !old.same_value(&value) => graph::trigger(self.id(), &TrackKey::field(key)),
            Some(_) => {}
        }
    }

    /// Remove a field, notifying readers of it and of the key set.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.target.remove(key)?;
        graph::trigger_keys(self.id(), &[TrackKey::field(key), TrackKey::Iterate]);
        Some(removed)
    }

    /// Whether the field exists. Tracks the field.
    pub fn contains_key(&self, key: &str) -> bool {
        graph::track(self.id(), TrackKey::field(key));
        self.target.contains_key(key)
    }

    /// Field names. Tracks the key set.
    pub fn keys(&self) -> Vec<Arc<str>> {
        graph::track(self.id(), TrackKey::Iterate);
        self.target.keys()
    }

    /// Number of fields. Tracks the key set.
    pub fn len(&self) -> usize {
        graph::track(self.id(), TrackKey::Iterate);
        self.target.len()
    }

    /// Whether there are no fields. Tracks the key set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying container.
    pub fn raw(&self) -> &Object {
        &self.target
    }

    /// The underlying container, by value.
    pub fn to_raw(&self) -> Object {
        self.target.clone()
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.target).finish()
    }
}

/// Wrap a container. Wrapping is idempotent: wrapping the same container
/// (or an existing view of it) yields a view that is [`Reactive::ptr_eq`]
/// to every other view of that container.
pub fn reactive(target: &Object) -> Reactive {
    Reactive::new(target.clone())
}

/// Whether `value` is an instrumented view.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Wrap structured values; return everything else unchanged.
pub fn to_reactive(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Reactive(Reactive::new(object)),
        other => other,
    }
}
