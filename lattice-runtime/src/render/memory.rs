//! In-memory backend.
//!
//! An arena-backed node tree that records every primitive the renderer
//! issues. Used by the tests and benches, and handy for server-side
//! rendering to markup.
//!
//! Node slots are never reclaimed: a removed node stays in the arena (so
//! its handle remains valid to inspect) and the op log grows with every
//! call. Memory grows with the total number of nodes ever created, so use
//! a fresh backend per render session rather than one long-lived instance.

use std::fmt::Write as _;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::backend::Backend;
use crate::error::BackendError;
use crate::reactive::Value;

/// Handle to a node in a [`MemoryBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub enum Op {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    CreateComment { node: NodeId, text: String },
    /// `moved` is set when the node was already attached somewhere.
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
        moved: bool,
    },
    Remove { node: NodeId },
    SetElementText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    PatchProp {
        node: NodeId,
        key: String,
        next: Option<Value>,
    },
}

/// Per-kind totals over the operation log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpCounts {
    pub creates: usize,
    /// Inserts of detached nodes.
    pub inserts: usize,
    /// Inserts of nodes that were already attached.
    pub moves: usize,
    pub removes: usize,
    pub text_writes: usize,
    pub prop_patches: usize,
}

impl OpCounts {
    /// Total number of backend mutations.
    pub fn total(&self) -> usize {
        self.creates + self.inserts + self.moves + self.removes + self.text_writes + self.prop_patches
    }
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        props: IndexMap<String, Value>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<NodeData>,
    ops: Vec<Op>,
    fail_on: Option<&'static str>,
}

impl Arena {
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId, operation: &'static str) -> Result<&NodeData, BackendError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| BackendError::new(operation, format!("unknown node {}", id.0)))
    }

    fn node_mut(
        &mut self,
        id: NodeId,
        operation: &'static str,
    ) -> Result<&mut NodeData, BackendError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| BackendError::new(operation, format!("unknown node {}", id.0)))
    }

    fn check(&self, operation: &'static str) -> Result<(), BackendError> {
        match self.fail_on {
            Some(failing) if failing == operation => {
                Err(BackendError::new(operation, "rejected by host"))
            }
            _ => Ok(()),
        }
    }

    fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(id.0).and_then(|node| node.parent.take()) else {
            return false;
        };
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.retain(|child| *child != id);
        }
        true
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node.0).and_then(|data| data.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Element { tag, props } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in props {
                    let _ = write!(out, " {key}=\"{value}\"");
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

/// A [`Backend`] over an in-memory node arena.
///
/// The arena only grows; see [`MemoryBackend::allocated`].
#[derive(Default)]
pub struct MemoryBackend {
    arena: Mutex<Arena>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element. Not recorded in the log.
    pub fn create_root(&self) -> NodeId {
        self.arena.lock().alloc(NodeKind::Element {
            tag: "root".to_owned(),
            props: IndexMap::new(),
        })
    }

    /// Number of node slots ever allocated, detached nodes included.
    pub fn allocated(&self) -> usize {
        self.arena.lock().nodes.len()
    }

    /// Make every later call to the named primitive fail.
    pub fn fail_on(&self, operation: Option<&'static str>) {
        self.arena.lock().fail_on = operation;
    }

    /// The operation log so far.
    pub fn ops(&self) -> Vec<Op> {
        self.arena.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.arena.lock().ops.clear();
    }

    pub fn counts(&self) -> OpCounts {
        let arena = self.arena.lock();
        let mut counts = OpCounts::default();
        for op in &arena.ops {
            match op {
                Op::CreateElement { .. } | Op::CreateText { .. } | Op::CreateComment { .. } => {
                    counts.creates += 1
                }
                Op::Insert { moved: true, .. } => counts.moves += 1,
                Op::Insert { moved: false, .. } => counts.inserts += 1,
                Op::Remove { .. } => counts.removes += 1,
                Op::SetElementText { .. } | Op::SetText { .. } => counts.text_writes += 1,
                Op::PatchProp { .. } => counts.prop_patches += 1,
            }
        }
        counts
    }

    /// Markup for `node` and everything below it.
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.arena.lock().write_markup(node, &mut out);
        out
    }

    /// Markup for the children of `node`.
    pub fn inner_markup(&self, node: NodeId) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        if let Some(data) = arena.nodes.get(node.0) {
            for child in &data.children {
                arena.write_markup(*child, &mut out);
            }
        }
        out
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena
            .lock()
            .nodes
            .get(node.0)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Current value of an element property.
    pub fn prop(&self, node: NodeId, key: &str) -> Option<Value> {
        match &self.arena.lock().nodes.get(node.0)?.kind {
            NodeKind::Element { props, .. } => props.get(key).cloned(),
            _ => None,
        }
    }

    /// Text of a text or comment node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.arena.lock().nodes.get(node.0)?.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            NodeKind::Element { .. } => None,
        }
    }
}

impl Backend for MemoryBackend {
    type Handle = NodeId;

    fn create_element(&self, tag: &str) -> Result<NodeId, BackendError> {
        let mut arena = self.arena.lock();
        arena.check("create_element")?;
        let node = arena.alloc(NodeKind::Element {
            tag: tag.to_owned(),
            props: IndexMap::new(),
        });
        arena.ops.push(Op::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text(&self, text: &str) -> Result<NodeId, BackendError> {
        let mut arena = self.arena.lock();
        arena.check("create_text")?;
        let node = arena.alloc(NodeKind::Text(text.to_owned()));
        arena.ops.push(Op::CreateText {
            node,
            text: text.to_owned(),
        });
        Ok(node)
    }

    fn create_comment(&self, text: &str) -> Result<NodeId, BackendError> {
        let mut arena = self.arena.lock();
        arena.check("create_comment")?;
        let node = arena.alloc(NodeKind::Comment(text.to_owned()));
        arena.ops.push(Op::CreateComment {
            node,
            text: text.to_owned(),
        });
        Ok(node)
    }

    fn insert(
        &self,
        node: &NodeId,
        parent: &NodeId,
        anchor: Option<&NodeId>,
    ) -> Result<(), BackendError> {
        let (node, parent, anchor) = (*node, *parent, anchor.copied());
        let mut arena = self.arena.lock();
        arena.check("insert")?;
        arena.node(node, "insert")?;
        if !matches!(arena.node(parent, "insert")?.kind, NodeKind::Element { .. }) {
            return Err(BackendError::new("insert", "parent is not an element"));
        }
        if arena.is_ancestor(node, parent) {
            return Err(BackendError::new("insert", "node would contain itself"));
        }
        if let Some(anchor) = anchor {
            if arena.node(anchor, "insert")?.parent != Some(parent) {
                return Err(BackendError::new("insert", "anchor is not a child of parent"));
            }
        }

        let moved = arena.detach(node);
        let data = arena.node_mut(parent, "insert")?;
        let index = anchor
            .and_then(|anchor| data.children.iter().position(|child| *child == anchor))
            .unwrap_or(data.children.len());
        data.children.insert(index, node);
        arena.node_mut(node, "insert")?.parent = Some(parent);
        arena.ops.push(Op::Insert {
            node,
            parent,
            anchor,
            moved,
        });
        Ok(())
    }

    fn remove(&self, node: &NodeId) -> Result<(), BackendError> {
        let mut arena = self.arena.lock();
        arena.check("remove")?;
        arena.node(*node, "remove")?;
        arena.detach(*node);
        arena.ops.push(Op::Remove { node: *node });
        Ok(())
    }

    fn set_element_text(&self, element: &NodeId, text: &str) -> Result<(), BackendError> {
        let mut arena = self.arena.lock();
        arena.check("set_element_text")?;
        let children = std::mem::take(&mut arena.node_mut(*element, "set_element_text")?.children);
        for child in children {
            if let Some(data) = arena.nodes.get_mut(child.0) {
                data.parent = None;
            }
        }
        if !text.is_empty() {
            let content = arena.alloc(NodeKind::Text(text.to_owned()));
            arena.node_mut(content, "set_element_text")?.parent = Some(*element);
            arena.node_mut(*element, "set_element_text")?.children.push(content);
        }
        arena.ops.push(Op::SetElementText {
            node: *element,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn set_text(&self, node: &NodeId, text: &str) -> Result<(), BackendError> {
        let mut arena = self.arena.lock();
        arena.check("set_text")?;
        match &mut arena.node_mut(*node, "set_text")?.kind {
            NodeKind::Text(content) | NodeKind::Comment(content) => {
                text.clone_into(content);
            }
            NodeKind::Element { .. } => {
                return Err(BackendError::new("set_text", "node is an element"));
            }
        }
        arena.ops.push(Op::SetText {
            node: *node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn patch_prop(
        &self,
        element: &NodeId,
        key: &str,
        _prev: Option<&Value>,
        next: Option<&Value>,
    ) -> Result<(), BackendError> {
        let mut arena = self.arena.lock();
        arena.check("patch_prop")?;
        match &mut arena.node_mut(*element, "patch_prop")?.kind {
            NodeKind::Element { props, .. } => match next {
                Some(value) => {
                    props.insert(key.to_owned(), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            },
            _ => return Err(BackendError::new("patch_prop", "node is not an element")),
        }
        arena.ops.push(Op::PatchProp {
            node: *element,
            key: key.to_owned(),
            next: next.cloned(),
        });
        Ok(())
    }

    fn parent_node(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.lock().nodes.get(node.0)?.parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let arena = self.arena.lock();
        let parent = arena.nodes.get(node.0)?.parent?;
        let siblings = &arena.nodes.get(parent.0)?.children;
        let index = siblings.iter().position(|child| child == node)?;
        siblings.get(index + 1).copied()
    }
}
