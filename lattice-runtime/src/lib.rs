//! Lattice Runtime
//!
//! This crate provides the runtime core for the Lattice UI framework.
//! It implements:
//!
//! - Reactive containers with automatic dependency tracking
//! - Effects and derived watches, batched through a job scheduler
//! - An immutable virtual tree of elements, text, fragments and components
//! - A backend-agnostic renderer with a keyed children diff
//!
//! # Architecture
//!
//! - `reactive`: proxies, subscription graph, effects and watch
//! - `scheduler`: pre-flush and render job queues
//! - `vdom`: tree nodes and component definitions
//! - `render`: backend trait, reconciliation and an in-memory backend
//!
//! # Example
//!
//! ```rust
//! use lattice_runtime::reactive::Object;
//! use lattice_runtime::render::{create_renderer, MemoryBackend};
//! use lattice_runtime::vdom::{h, ComponentDef, component};
//! use lattice_runtime::scheduler;
//!
//! let renderer = create_renderer(MemoryBackend::new());
//! let root = renderer.backend().create_root();
//!
//! let counter = ComponentDef::with_data(
//!     "Counter",
//!     |_| Object::new().with("count", 0),
//!     |cx| h("span", None, cx.state.get("count")),
//! );
//! let app = component(&counter, None);
//! renderer.render(Some(app.clone()), &root)?;
//!
//! // Writes are batched until the scheduler flushes.
//! let state = app.component().map(|instance| instance.state().clone());
//! if let Some(state) = state {
//!     state.set("count", 5);
//! }
//! scheduler::flush_all()?;
//!
//! assert_eq!(renderer.backend().inner_markup(root), "<span>5</span>");
//! # Ok::<(), lattice_runtime::RuntimeError>(())
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;
pub mod vdom;

pub use config::RuntimeConfig;
pub use error::{BackendError, Result, RuntimeError};
pub use reactive::{
    effect, is_reactive, reactive, to_reactive, untracked, watch, Effect, Reactive, Value,
};
pub use render::{create_renderer, Backend, Renderer};
pub use scheduler::{flush_all, next_tick};
