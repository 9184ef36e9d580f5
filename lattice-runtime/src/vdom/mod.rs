//! Virtual Tree
//!
//! Immutable descriptions of UI built by render functions and consumed by
//! the renderer.

mod component;
mod node;

pub use component::{ComponentDef, ComponentInstance, RenderContext};
pub use node::{
    comment, component, fragment, h, props, text, Children, ChildrenKind, Key, NodeType, Props,
    VNode, VNodeRef, KEY_PROP,
};
