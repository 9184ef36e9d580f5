//! Reactive Primitives
//!
//! This module implements the fine-grained dependency engine: reactive
//! containers, effects and watchers.
//!
//! # Concepts
//!
//! ## Reactive containers
//!
//! [`reactive`] wraps a plain [`Object`] in an instrumented view. Reading a
//! field through the view inside a running computation subscribes that
//! computation to the field; writing a different value notifies every
//! subscriber.
//!
//! ## Effects
//!
//! An [`Effect`] is a re-runnable computation. Each run forgets the
//! previous run's dependencies and records new ones, so conditional reads
//! never leave stale subscriptions behind.
//!
//! ## Watchers
//!
//! [`watch`] layers change detection on top of an effect: a getter (or a
//! whole reactive container, traversed deeply) plus a callback that receives
//! the new and previous values.
//!
//! # Implementation Notes
//!
//! The currently running computation lives on a thread-local stack (see
//! [`ReactiveContext`]). The subscription graph is a global map from
//! container identity to per-field dependency sets (see [`graph`]).

mod context;
mod effect;
pub mod graph;
mod proxy;
mod subscriber;
mod value;
mod watch;

pub use context::{untracked, ReactiveContext};
pub use effect::{effect, Effect, EffectScheduler, WeakEffect};
pub use graph::{track, trigger, Dep, TrackKey};
pub use proxy::{is_reactive, reactive, to_reactive, Reactive};
pub use subscriber::{Subscriber, SubscriberId};
pub use value::{Object, TargetId, Value};
pub use watch::{traverse, watch, WatchHandle, WatchOptions, WatchSource};
