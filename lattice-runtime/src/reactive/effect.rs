//! Effect Implementation
//!
//! An Effect is a re-runnable computation that records which reactive
//! locations it read during its last run.
//!
//! # How Effects Work
//!
//! 1. [`Effect::run`] leaves every dependency set recorded by the previous
//!    run, pushes the effect onto the reactive context stack and calls the
//!    wrapped function. Every tracked read attributes itself to the effect.
//!
//! 2. When a recorded location changes, the effect is notified. With a
//!    custom scheduler the scheduler decides when to re-run (usually by
//!    queueing a job); without one the effect re-runs on the spot.
//!
//! 3. [`Effect::stop`] leaves all dependency sets for good. A stopped effect
//!    is never notified again, and running it explicitly just calls the
//!    function without tracking.
//!
//! The fire-and-forget [`effect`] helper queues re-runs on the scheduler so
//! that several writes in one turn cause one re-run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::graph::Dep;
use super::subscriber::{Subscriber, SubscriberId};
use crate::scheduler::{self, Job, JobId};

/// Custom scheduling hook invoked instead of re-running directly.
pub type EffectScheduler<T> = Arc<dyn Fn(&Effect<T>) + Send + Sync>;

struct EffectInner<T> {
    id: SubscriberId,
    this: Weak<EffectInner<T>>,
    func: Box<dyn Fn() -> T + Send + Sync>,
    scheduler: Option<EffectScheduler<T>>,
    active: AtomicBool,
    deps: Mutex<SmallVec<[Weak<Dep>; 4]>>,
    run_count: AtomicUsize,
}

impl<T: 'static> EffectInner<T> {
    fn run(&self) -> T {
        if !self.active.load(Ordering::SeqCst) {
            return (self.func)();
        }

        self.cleanup();

        let Some(this) = self.this.upgrade() else {
            return (self.func)();
        };
        let _ctx = ReactiveContext::enter(this);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        (self.func)()
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.unsubscribe(self.id);
        }
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            tracing::debug!(effect = self.id.raw(), "effect stopped");
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn record_dependency(&self, dep: &Arc<Dep>) {
        self.deps.lock().push(Arc::downgrade(dep));
    }

    fn notify(&self) {
        if !self.is_active() {
            return;
        }
        match &self.scheduler {
            Some(scheduler) => {
                if let Some(inner) = self.this.upgrade() {
                    scheduler(&Effect { inner });
                }
            }
            None => {
                self.run();
            }
        }
    }
}

/// A re-runnable tracked computation.
///
/// Cloning an `Effect` creates another handle to the same computation.
pub struct Effect<T = ()> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create an effect that re-runs directly when notified.
    ///
    /// The function does not run until [`Effect::run`] is called.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(Box::new(func), None)
    }

    /// Create an effect whose re-runs are routed through `scheduler`.
    pub fn with_scheduler<F, S>(func: F, scheduler: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(&Effect<T>) + Send + Sync + 'static,
    {
        Self::build(Box::new(func), Some(Arc::new(scheduler)))
    }

    fn build(
        func: Box<dyn Fn() -> T + Send + Sync>,
        scheduler: Option<EffectScheduler<T>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|this| EffectInner {
            id: SubscriberId::new(),
            this: this.clone(),
            func,
            scheduler,
            active: AtomicBool::new(true),
            deps: Mutex::new(SmallVec::new()),
            run_count: AtomicUsize::new(0),
        });
        Self { inner }
    }

    /// Run the computation, re-establishing its dependencies.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Leave every dependency set and never track again. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// The subscriber ID used for dependency tracking.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of dependency sets the effect currently sits in.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .deps
            .lock()
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    /// A handle that does not keep the effect alive.
    pub fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The effect as a type-erased subscriber, for liveness checks.
    pub(crate) fn as_subscriber(&self) -> Weak<dyn Subscriber> {
        let weak: Weak<EffectInner<T>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .field("run_count", &self.inner.run_count.load(Ordering::SeqCst))
            .finish()
    }
}

/// Non-owning handle to an [`Effect`].
pub struct WeakEffect<T> {
    inner: Weak<EffectInner<T>>,
}

impl<T> WeakEffect<T> {
    pub fn upgrade(&self) -> Option<Effect<T>> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

impl<T> Clone for WeakEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Run `func` now and again after every flush in which something it read
/// changed.
///
/// The returned handle may be ignored; the effect stays alive as long as it
/// is subscribed to something.
pub fn effect<F>(func: F) -> Effect<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let job_id = JobId::next();
    let effect = Effect::with_scheduler(func, move |effect: &Effect<()>| {
        let weak = effect.downgrade();
        let job = Job::new(job_id, move || {
            if let Some(effect) = weak.upgrade() {
                effect.run();
            }
            Ok(())
        })
        .with_owner(effect.as_subscriber());
        scheduler::queue_job(job);
    });
    effect.run();
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
