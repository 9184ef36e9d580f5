//! Plain data model.
//!
//! [`Object`] is the structured container application code owns; it has
//! identity (cloning the handle shares the same fields) and knows nothing
//! about tracking. [`Value`] is the closed set of things a field can hold.
//! Wrapping an `Object` with [`crate::reactive::reactive`] yields the
//! instrumented view; `Value::Reactive` carries such a view around.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::graph;
use super::proxy::Reactive;

/// Identity of an [`Object`], used as the subscription graph key.
///
/// IDs come from a monotonically increasing counter and are never reused,
/// so an entry left behind by a dropped container can never be confused with
/// a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub(crate) struct ObjectInner {
    id: TargetId,
    fields: RwLock<IndexMap<Arc<str>, Value>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        graph::release_target(self.id);
    }
}

/// A structured data container with ordered string keys.
///
/// Cloning an `Object` clones the handle, not the data.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: TargetId::next(),
                fields: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// The container's identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether two handles point at the same container.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a field without any tracking.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Write a field without notifying anyone, returning the previous value.
    pub fn insert(&self, key: impl Into<Arc<str>>, value: impl Into<Value>) -> Option<Value> {
        let value = value.into().into_raw();
        self.inner.fields.write().insert(key.into(), value)
    }

    /// Remove a field without notifying anyone.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.fields.write().shift_remove(key)
    }

    /// Whether the field exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<Arc<str>> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    /// Whether the container has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Serialize to JSON. A container reachable from itself is emitted as
    /// `null` at the point where it recurs.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.clone()).to_json()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only keys: fields may point back at this object.
        f.debug_struct("Object")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<Arc<str>>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

/// Anything a field can hold.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    /// A plain, uninstrumented container.
    Object(Object),
    /// An instrumented view of a container.
    Reactive(Reactive),
}

impl Value {
    /// Identity comparison with `Object.is` semantics: `NaN` equals itself,
    /// `+0` and `-0` differ, strings compare by content and containers by
    /// identity (a reactive view is the same value as its raw container).
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => match (self.container(), other.container()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }

    /// Whether this value is a structured container (raw or wrapped).
    pub fn is_object(&self) -> bool {
        self.container().is_some()
    }

    /// The underlying container, if any.
    pub fn container(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            Value::Reactive(reactive) => Some(reactive.raw()),
            _ => None,
        }
    }

    /// Strip any reactive wrapper. Containers never store wrappers.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(reactive) => Value::Object(reactive.to_raw()),
            other => other,
        }
    }

    /// The reactive view, if this value is one.
    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(reactive) => Some(reactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used when a value becomes text children.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Convert to JSON, emitting `null` for a container already on the
    /// current path.
    pub fn to_json(&self) -> serde_json::Value {
        fn walk(value: &Value, path: &mut HashSet<TargetId>) -> serde_json::Value {
            match value {
                Value::Null => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(*b),
                Value::Number(n) => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Value::Str(s) => serde_json::Value::String(s.to_string()),
                Value::Object(_) | Value::Reactive(_) => {
                    let Some(object) = value.container() else {
                        return serde_json::Value::Null;
                    };
                    if !path.insert(object.id()) {
                        return serde_json::Value::Null;
                    }
                    let fields = object.inner.fields.read().clone();
                    let map = fields
                        .iter()
                        .map(|(key, field)| (key.to_string(), walk(field, path)))
                        .collect();
                    path.remove(&object.id());
                    serde_json::Value::Object(map)
                }
            }
        }
        walk(self, &mut HashSet::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) | Value::Reactive(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Reactive> for Value {
    fn from(value: Reactive) -> Self {
        Value::Reactive(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), Value::from(item)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
