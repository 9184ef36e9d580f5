//! Components
//!
//! A [`ComponentDef`] is a reusable recipe: an optional data factory that
//! produces the component's reactive state and a render function that turns
//! state and props into a subtree. Mounting a component placeholder creates
//! a [`ComponentInstance`]; the renderer drives it with a render effect so
//! that state changes re-render through the scheduler.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::node::{Props, VNode, VNodeRef};
use crate::error::Result;
use crate::reactive::{reactive, untracked, Effect, Object, Reactive};
use crate::scheduler::{self, JobId};

/// What a render function gets to read.
pub struct RenderContext<'a> {
    /// Component state. Reads here are tracked by the render effect.
    pub state: &'a Reactive,
    /// Props from the placeholder node.
    pub props: &'a Props,
}

type DataFn = dyn Fn(&Props) -> Object + Send + Sync;
type RenderFn<H> = dyn Fn(&RenderContext<'_>) -> VNodeRef<H> + Send + Sync;

struct DefInner<H> {
    name: String,
    data: Option<Box<DataFn>>,
    render: Box<RenderFn<H>>,
}

/// A component definition. Clones share identity.
pub struct ComponentDef<H> {
    inner: Arc<DefInner<H>>,
}

impl<H> ComponentDef<H> {
    /// A stateless component.
    pub fn new<R>(name: impl Into<String>, render: R) -> Self
    where
        R: Fn(&RenderContext<'_>) -> VNodeRef<H> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DefInner {
                name: name.into(),
                data: None,
                render: Box::new(render),
            }),
        }
    }

    /// A component whose state is produced by `data` at setup.
    pub fn with_data<D, R>(name: impl Into<String>, data: D, render: R) -> Self
    where
        D: Fn(&Props) -> Object + Send + Sync + 'static,
        R: Fn(&RenderContext<'_>) -> VNodeRef<H> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DefInner {
                name: name.into(),
                data: Some(Box::new(data)),
                render: Box::new(render),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether both handles refer to the same definition.
    pub fn ptr_eq(&self, other: &ComponentDef<H>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn setup(&self, props: &Props) -> Reactive {
        let data = match &self.inner.data {
            Some(data) => untracked(|| data(props)),
            None => Object::new(),
        };
        reactive(&data)
    }
}

impl<H> Clone for ComponentDef<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> fmt::Debug for ComponentDef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// A mounted component.
///
/// The placeholder node holds the instance; the instance only points back
/// weakly at whichever placeholder currently represents it.
pub struct ComponentInstance<H> {
    def: ComponentDef<H>,
    state: Reactive,
    props: Mutex<Arc<Props>>,
    placeholder: Mutex<Weak<VNode<H>>>,
    subtree: Mutex<Option<VNodeRef<H>>>,
    mounted: AtomicBool,
    effect: OnceLock<Effect<Result<()>>>,
    job_id: JobId,
}

impl<H> ComponentInstance<H> {
    /// Create an instance for `placeholder` and run the data factory.
    pub(crate) fn new(def: &ComponentDef<H>, placeholder: &VNodeRef<H>) -> Arc<Self> {
        let props = placeholder.props().cloned().unwrap_or_default();
        let state = def.setup(&props);
        Arc::new(Self {
            def: def.clone(),
            state,
            props: Mutex::new(props),
            placeholder: Mutex::new(Arc::downgrade(placeholder)),
            subtree: Mutex::new(None),
            mounted: AtomicBool::new(false),
            effect: OnceLock::new(),
            job_id: JobId::next(),
        })
    }

    pub fn def(&self) -> &ComponentDef<H> {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The component's reactive state.
    pub fn state(&self) -> &Reactive {
        &self.state
    }

    pub fn props(&self) -> Arc<Props> {
        Arc::clone(&self.props.lock())
    }

    /// Swap in new props, reporting whether they differ from the old ones.
    pub(crate) fn replace_props(&self, next: Option<&Arc<Props>>) -> bool {
        let next = next.cloned().unwrap_or_default();
        let mut props = self.props.lock();
        let changed = !Arc::ptr_eq(&props, &next) && !props_equal(&props, &next);
        *props = next;
        changed
    }

    /// Call the render function with the current state and props.
    pub(crate) fn render_subtree(&self) -> VNodeRef<H> {
        let props = self.props();
        (self.def.inner.render)(&RenderContext {
            state: &self.state,
            props: &props,
        })
    }

    /// The most recently rendered subtree.
    pub fn subtree(&self) -> Option<VNodeRef<H>> {
        self.subtree.lock().clone()
    }

    pub(crate) fn replace_subtree(&self, subtree: Option<VNodeRef<H>>) -> Option<VNodeRef<H>> {
        std::mem::replace(&mut *self.subtree.lock(), subtree)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    /// The placeholder node currently representing this instance.
    pub fn placeholder(&self) -> Option<VNodeRef<H>> {
        self.placeholder.lock().upgrade()
    }

    pub(crate) fn set_placeholder(&self, placeholder: &VNodeRef<H>) {
        *self.placeholder.lock() = Arc::downgrade(placeholder);
    }

    /// The render effect, once installed.
    pub fn effect(&self) -> Option<&Effect<Result<()>>> {
        self.effect.get()
    }

    pub(crate) fn install_effect(&self, effect: Effect<Result<()>>) -> &Effect<Result<()>> {
        self.effect.get_or_init(|| effect)
    }

    pub(crate) fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Re-render now, dropping any re-render already queued for this instance.
    pub(crate) fn update(&self) -> Result<()> {
        scheduler::invalidate_job(self.job_id);
        match self.effect.get() {
            Some(effect) if effect.is_active() => effect.run(),
            _ => Ok(()),
        }
    }

    /// Stop re-rendering and hand back the subtree to unmount.
    pub(crate) fn teardown(&self) -> Option<VNodeRef<H>> {
        if let Some(effect) = self.effect.get() {
            effect.stop();
        }
        scheduler::invalidate_job(self.job_id);
        self.set_mounted(false);
        self.replace_subtree(None)
    }
}

impl<H> fmt::Debug for ComponentInstance<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.def.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

fn props_equal(a: &Props, b: &Props) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && va.same_value(vb))
}
