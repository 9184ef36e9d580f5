//! Rendering
//!
//! The reconciliation engine. A [`Renderer`] is built over a [`Backend`]
//! and patches tree nodes into backend containers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   patch    ┌──────────────┐   primitives   ┌─────────┐
//! │  VNode   │ ─────────► │   Renderer   │ ─────────────► │ Backend │
//! └──────────┘            └──────────────┘                └─────────┘
//!                           │  children diff (keyed, LIS)
//!                           │  props diff
//!                           ▼
//!                         component render effects ──► scheduler
//! ```

mod backend;
mod children;
pub mod memory;
mod props;
mod renderer;
mod sequence;

pub use backend::Backend;
pub use memory::{MemoryBackend, NodeId, Op, OpCounts};
pub use props::patch_props;
pub use renderer::{create_renderer, Node, Renderer};
pub use sequence::longest_increasing_subsequence;
