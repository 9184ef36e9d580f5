//! Derived Watch
//!
//! `watch` pairs a source-reading getter with a callback. The getter runs
//! inside an effect; when something it read changes, the effect's scheduler
//! queues a pre-flush job that re-runs the getter and calls the callback
//! with the new and previous values.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::context::untracked;
use super::effect::Effect;
use super::proxy::Reactive;
use super::value::{TargetId, Value};
use crate::scheduler::{self, Job, JobId};

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Call the callback once right away, with `Value::Null` as the old value.
    pub immediate: bool,
    /// Read every nested field so any change underneath fires the callback.
    pub deep: bool,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            deep: false,
        }
    }

    pub fn deep() -> Self {
        Self {
            immediate: false,
            deep: true,
        }
    }
}

type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// What a watcher observes.
#[derive(Clone)]
pub enum WatchSource {
    /// A reactive container. Always watched deeply.
    Reactive(Reactive),
    /// A getter; whatever it reads is tracked.
    Getter(Getter),
    /// Anything else. Never fires.
    Inert(Value),
}

impl WatchSource {
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        WatchSource::Getter(Arc::new(getter))
    }
}

impl From<Reactive> for WatchSource {
    fn from(source: Reactive) -> Self {
        WatchSource::Reactive(source)
    }
}

impl From<&Reactive> for WatchSource {
    fn from(source: &Reactive) -> Self {
        WatchSource::Reactive(source.clone())
    }
}

impl From<Value> for WatchSource {
    fn from(source: Value) -> Self {
        match source {
            Value::Reactive(reactive) => WatchSource::Reactive(reactive),
            other => WatchSource::Inert(other),
        }
    }
}

/// Disposer returned by [`watch`].
///
/// Dropping the handle does not stop the watcher.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    effect: Effect<Value>,
}

impl WatchHandle {
    /// Stop watching. Idempotent; a callback already queued will not run.
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

struct Watcher {
    deep: bool,
    callback: Box<dyn Fn(&Value, &Value) + Send + Sync>,
    old_value: Mutex<Value>,
}

impl Watcher {
    fn fire(&self, effect: &Effect<Value>) {
        if !effect.is_active() {
            return;
        }
        let new_value = effect.run();
        let changed = self.deep || !new_value.same_value(&self.old_value.lock());
        if changed {
            let old_value = std::mem::replace(&mut *self.old_value.lock(), new_value.clone());
            untracked(|| (self.callback)(&new_value, &old_value));
        }
    }
}

/// Call `callback(new, old)` whenever `source` changes.
pub fn watch<S, F>(source: S, callback: F, options: WatchOptions) -> WatchHandle
where
    S: Into<WatchSource>,
    F: Fn(&Value, &Value) + Send + Sync + 'static,
{
    let mut deep = options.deep;
    let base: Getter = match source.into() {
        WatchSource::Reactive(reactive) => {
            deep = true;
            Arc::new(move || Value::Reactive(reactive.clone()))
        }
        WatchSource::Getter(getter) => getter,
        WatchSource::Inert(value) => {
            tracing::warn!(?value, "watch source is neither reactive nor a getter; it will never fire");
            Arc::new(move || value.clone())
        }
    };
    let getter: Getter = if deep {
        Arc::new(move || {
            let value = base();
            traverse(&value);
            value
        })
    } else {
        base
    };

    let watcher = Arc::new(Watcher {
        deep,
        callback: Box::new(callback),
        old_value: Mutex::new(Value::Null),
    });

    let job_id = JobId::next();
    let scheduled = Arc::clone(&watcher);
    let effect = Effect::with_scheduler(
        move || getter(),
        move |effect: &Effect<Value>| {
            let weak = effect.downgrade();
            let watcher = Arc::clone(&scheduled);
            let job = Job::new(job_id, move || {
                if let Some(effect) = weak.upgrade() {
                    watcher.fire(&effect);
                }
                Ok(())
            })
            .with_owner(effect.as_subscriber());
            scheduler::queue_pre_flush(job);
        },
    );

    if options.immediate {
        watcher.fire(&effect);
    } else {
        *watcher.old_value.lock() = effect.run();
    }

    WatchHandle { effect }
}

/// Read every field reachable from `value`, purely to track it.
///
/// Containers already visited are skipped, so self-referencing data
/// terminates.
pub fn traverse(value: &Value) {
    fn walk(value: &Value, seen: &mut HashSet<TargetId>) {
        let Value::Reactive(reactive) = value else {
            return;
        };
        if !seen.insert(reactive.id()) {
            return;
        }
        for key in reactive.keys() {
            walk(&reactive.get(&key), seen);
        }
    }
    walk(value, &mut HashSet::new());
}
