//! Tree Nodes
//!
//! A [`VNode`] describes one piece of UI: an element, a text or comment
//! node, a fragment, or a component placeholder. Nodes are shared as
//! [`VNodeRef`] and are immutable apart from the backend handles (and
//! component instance) the renderer attaches once they are mounted.
//!
//! A node is live in at most one place at a time. Rendering the same
//! [`VNodeRef`] at the same position again is free; mounting it somewhere
//! else while it is still live is refused by the renderer.
//!
//! The shape of a node's children is a closed enum fixed at construction,
//! so it can never disagree with the children themselves.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::component::{ComponentDef, ComponentInstance};
use crate::reactive::Value;

/// Shared handle to a tree node.
pub type VNodeRef<H> = Arc<VNode<H>>;

/// Node properties, in declaration order.
pub type Props = IndexMap<String, Value>;

/// The reserved property lifted into [`VNode::key`].
pub const KEY_PROP: &str = "key";

/// Build a [`Props`] map.
pub fn props<I, K, V>(entries: I) -> Props
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// What a node is.
pub enum NodeType<H> {
    /// A host element with the given tag.
    Element(Arc<str>),
    Text,
    Comment,
    /// A sequence of siblings with no backend node of its own.
    Fragment,
    Component(ComponentDef<H>),
}

impl<H> NodeType<H> {
    /// Same tag, same marker or the same component definition.
    pub fn same(&self, other: &NodeType<H>) -> bool {
        match (self, other) {
            (NodeType::Element(a), NodeType::Element(b)) => a == b,
            (NodeType::Text, NodeType::Text)
            | (NodeType::Comment, NodeType::Comment)
            | (NodeType::Fragment, NodeType::Fragment) => true,
            (NodeType::Component(a), NodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NodeType::Element(_) => "element",
            NodeType::Text => "text",
            NodeType::Comment => "comment",
            NodeType::Fragment => "fragment",
            NodeType::Component(_) => "component",
        }
    }
}

impl<H> Clone for NodeType<H> {
    fn clone(&self) -> Self {
        match self {
            NodeType::Element(tag) => NodeType::Element(Arc::clone(tag)),
            NodeType::Text => NodeType::Text,
            NodeType::Comment => NodeType::Comment,
            NodeType::Fragment => NodeType::Fragment,
            NodeType::Component(def) => NodeType::Component(def.clone()),
        }
    }
}

impl<H> fmt::Debug for NodeType<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Element(tag) => f.debug_tuple("Element").field(tag).finish(),
            NodeType::Component(def) => f.debug_tuple("Component").field(&def.name()).finish(),
            other => f.write_str(other.label()),
        }
    }
}

impl<H> From<&str> for NodeType<H> {
    fn from(tag: &str) -> Self {
        NodeType::Element(Arc::from(tag))
    }
}

impl<H> From<ComponentDef<H>> for NodeType<H> {
    fn from(def: ComponentDef<H>) -> Self {
        NodeType::Component(def)
    }
}

/// A node's children.
pub enum Children<H> {
    None,
    /// A single text payload, already stringified.
    Text(String),
    Array(Vec<VNodeRef<H>>),
}

/// The shape of a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildrenKind {
    None,
    Text,
    Array,
}

impl<H> Children<H> {
    pub fn kind(&self) -> ChildrenKind {
        match self {
            Children::None => ChildrenKind::None,
            Children::Text(_) => ChildrenKind::Text,
            Children::Array(_) => ChildrenKind::Array,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[VNodeRef<H>]> {
        match self {
            Children::Array(children) => Some(children),
            _ => None,
        }
    }
}

impl<H> From<()> for Children<H> {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl<H> From<&str> for Children<H> {
    fn from(text: &str) -> Self {
        Children::Text(text.to_owned())
    }
}

impl<H> From<String> for Children<H> {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl<H> From<Value> for Children<H> {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Children::None
        } else {
            Children::Text(value.to_text())
        }
    }
}

impl<H> From<Vec<VNodeRef<H>>> for Children<H> {
    fn from(children: Vec<VNodeRef<H>>) -> Self {
        Children::Array(children)
    }
}

impl<H, T: Into<Children<H>>> From<Option<T>> for Children<H> {
    fn from(children: Option<T>) -> Self {
        children.map(Into::into).unwrap_or(Children::None)
    }
}

/// A node key, compared when deciding whether two nodes can be patched into
/// each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Arc<str>),
}

impl Key {
    fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Null => None,
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(Key::Int(*n as i64)),
            Value::Str(s) => Some(Key::Str(Arc::clone(s))),
            other => Some(Key::Str(Arc::from(other.to_text()))),
        }
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(Arc::from(key))
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Key::Int(key)
    }
}

/// One unit of UI description.
pub struct VNode<H> {
    node_type: NodeType<H>,
    key: Option<Key>,
    props: Option<Arc<Props>>,
    children: Children<H>,
    el: Mutex<Option<H>>,
    anchor: Mutex<Option<H>>,
    component: Mutex<Option<Arc<ComponentInstance<H>>>>,
    mounted: AtomicBool,
}

impl<H> VNode<H> {
    /// Create a node, lifting `key` out of `props` and normalizing children.
    pub fn new(
        node_type: impl Into<NodeType<H>>,
        props: Option<Props>,
        children: impl Into<Children<H>>,
    ) -> VNodeRef<H> {
        let node_type = node_type.into();
        let (key, props) = match props {
            Some(mut props) => {
                let key = props.shift_remove(KEY_PROP).and_then(|v| Key::from_value(&v));
                (key, Some(Arc::new(props)))
            }
            None => (None, None),
        };

        let children = match (&node_type, children.into()) {
            // Fragments only ever hold nodes.
            (NodeType::Fragment, Children::Text(text)) => Children::Array(vec![self::text(text)]),
            (_, children) => children,
        };

        Arc::new(VNode {
            node_type,
            key,
            props,
            children,
            el: Mutex::new(None),
            anchor: Mutex::new(None),
            component: Mutex::new(None),
            mounted: AtomicBool::new(false),
        })
    }

    /// Whether `self` can be patched into `other` instead of being replaced.
    pub fn same_type(&self, other: &VNode<H>) -> bool {
        self.node_type.same(&other.node_type) && self.key == other.key
    }

    pub fn node_type(&self) -> &NodeType<H> {
        &self.node_type
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> Option<&Arc<Props>> {
        self.props.as_ref()
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.as_ref().and_then(|props| props.get(name))
    }

    pub fn children(&self) -> &Children<H> {
        &self.children
    }

    pub fn children_kind(&self) -> ChildrenKind {
        self.children.kind()
    }

    /// Whether the node is a host element (has a textual tag).
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element(_))
    }

    pub fn is_component(&self) -> bool {
        matches!(self.node_type, NodeType::Component(_))
    }

    /// Text payload of a text or comment node.
    pub fn text_content(&self) -> &str {
        self.children.as_text().unwrap_or_default()
    }

    pub(crate) fn label(&self) -> &'static str {
        self.node_type.label()
    }

    /// The mounted component instance, for component placeholders.
    pub fn component(&self) -> Option<Arc<ComponentInstance<H>>> {
        self.component.lock().clone()
    }

    pub(crate) fn set_component(&self, instance: Arc<ComponentInstance<H>>) {
        *self.component.lock() = Some(instance);
    }

    /// Whether the node currently stands for live backend nodes.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }
}

impl<H: Clone> VNode<H> {
    /// The backend handle produced when this node was mounted.
    pub fn el(&self) -> Option<H> {
        self.el.lock().clone()
    }

    pub(crate) fn set_el(&self, el: Option<H>) {
        *self.el.lock() = el;
    }

    /// End marker of a mounted fragment. The start marker is [`VNode::el`].
    pub fn anchor(&self) -> Option<H> {
        self.anchor.lock().clone()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<H>) {
        *self.anchor.lock() = anchor;
    }
}

impl<H> fmt::Debug for VNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.node_type)
            .field("key", &self.key)
            .field("children", &self.children.kind())
            .finish()
    }
}

/// Create an element node.
pub fn h<H>(tag: &str, props: Option<Props>, children: impl Into<Children<H>>) -> VNodeRef<H> {
    VNode::new(tag, props, children)
}

/// Create a text node.
pub fn text<H>(content: impl Into<String>) -> VNodeRef<H> {
    VNode::new(NodeType::Text, None, Children::Text(content.into()))
}

/// Create a comment node.
pub fn comment<H>(content: impl Into<String>) -> VNodeRef<H> {
    VNode::new(NodeType::Comment, None, Children::Text(content.into()))
}

/// Create a fragment.
pub fn fragment<H>(children: Vec<VNodeRef<H>>) -> VNodeRef<H> {
    VNode::new(NodeType::Fragment, None, children)
}

/// Create a component placeholder.
pub fn component<H>(def: &ComponentDef<H>, props: Option<Props>) -> VNodeRef<H> {
    VNode::new(NodeType::Component(def.clone()), props, Children::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = VNodeRef<u32>;

    #[test]
    fn children_shape_follows_construction() {
        let empty: Node = h("div", None, ());
        assert_eq!(empty.children_kind(), ChildrenKind::None);

        let texty: Node = h("div", None, Value::from(42));
        assert_eq!(texty.children_kind(), ChildrenKind::Text);
        assert_eq!(texty.children().as_text(), Some("42"));

        let nested: Node = h("ul", None, vec![h("li", None, "a")]);
        assert_eq!(nested.children_kind(), ChildrenKind::Array);
        assert!(nested.is_element());
    }

    #[test]
    fn markers_are_not_elements() {
        let t: Node = text("hi");
        let c: Node = comment("note");
        let f: Node = fragment(vec![]);
        assert!(!t.is_element());
        assert!(!c.is_element());
        assert!(!f.is_element());
        assert_eq!(t.text_content(), "hi");
    }

    #[test]
    fn key_is_lifted_out_of_props() {
        let node: Node = h("li", Some(props([("key", Value::from("a")), ("id", Value::from("x"))])), ());
        assert_eq!(node.key(), Some(&Key::from("a")));
        assert!(node.prop("key").is_none());
        assert!(node.prop("id").is_some());

        let numbered: Node = h("li", Some(props([("key", 3)])), ());
        assert_eq!(numbered.key(), Some(&Key::Int(3)));
    }

    #[test]
    fn same_type_compares_type_and_key() {
        let a: Node = h("li", Some(props([("key", "a")])), ());
        let a2: Node = h("li", Some(props([("key", "a")])), "other");
        let b: Node = h("li", Some(props([("key", "b")])), ());
        let span: Node = h("span", Some(props([("key", "a")])), ());
        let unkeyed: Node = h("li", None, ());
        let unkeyed2: Node = h("li", None, ());

        assert!(a.same_type(&a2));
        assert!(!a.same_type(&b));
        assert!(!a.same_type(&span));
        assert!(!a.same_type(&unkeyed));
        assert!(unkeyed.same_type(&unkeyed2));
    }

    #[test]
    fn fragment_text_becomes_a_text_child() {
        let node: Node = VNode::new(NodeType::Fragment, None, "loose");
        let children = node.children().as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text_content(), "loose");
    }
}
