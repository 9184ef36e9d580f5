//! Renderer
//!
//! Turns tree nodes into backend mutations. `patch` compares an old node
//! with its replacement and issues the smallest set of backend calls that
//! makes the host match the new node:
//!
//! - the same node on both sides does nothing at all
//! - nodes of different type (or key) are unmounted and replaced
//! - elements, text and comments reuse their backend handle
//! - fragments and element children go through the keyed children diff
//! - components re-render through their own render effect
//!
//! A fragment is bracketed by two empty text nodes, so it always has a
//! position in the host even when it has no children.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::backend::Backend;
use super::props::patch_props;
use crate::error::{Result, RuntimeError};
use crate::reactive::Effect;
use crate::scheduler::{self, Job};
use crate::vdom::{Children, ComponentDef, ComponentInstance, NodeType, VNodeRef};

/// A node rendered by a backend of type `B`.
pub type Node<B> = VNodeRef<<B as Backend>::Handle>;

pub(crate) struct RendererInner<B: Backend> {
    pub(crate) backend: B,
    roots: Mutex<HashMap<B::Handle, Node<B>>>,
}

/// Renders tree nodes into containers of one backend.
///
/// Cloning a `Renderer` creates another handle to the same renderer.
pub struct Renderer<B: Backend> {
    inner: Arc<RendererInner<B>>,
}

/// Create a renderer over `backend`.
pub fn create_renderer<B: Backend>(backend: B) -> Renderer<B> {
    Renderer::new(backend)
}

impl<B: Backend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(RendererInner {
                backend,
                roots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Render `vnode` into `container`.
    ///
    /// The node is patched against whatever was last rendered into the same
    /// container. `None` unmounts it.
    pub fn render(&self, vnode: Option<Node<B>>, container: &B::Handle) -> Result<()> {
        let prev = self.inner.roots.lock().get(container).cloned();
        match (prev, vnode) {
            (Some(prev), None) => {
                self.inner.unmount(&prev, true)?;
                self.inner.roots.lock().remove(container);
            }
            (prev, Some(next)) => {
                self.inner.patch(prev.as_ref(), &next, container, None)?;
                self.inner.roots.lock().insert(container.clone(), next);
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// The node last rendered into `container`.
    pub fn root(&self, container: &B::Handle) -> Option<Node<B>> {
        self.inner.roots.lock().get(container).cloned()
    }
}

impl<B: Backend> Clone for Renderer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> RendererInner<B> {
    /// Bring the host in line with `new`, given what `old` produced.
    pub(crate) fn patch(
        self: &Arc<Self>,
        old: Option<&Node<B>>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let mut old = old;
        let mut replaced_anchor = None;
        if let Some(prev) = old {
            if Arc::ptr_eq(prev, new) {
                return Ok(());
            }
        }
        if new.is_mounted() {
            return Err(RuntimeError::NodeReused { node: new.label() });
        }
        if let Some(prev) = old {
            if !prev.same_type(new) {
                replaced_anchor = Some(self.next_host_node(prev, anchor));
                self.unmount(prev, true)?;
                old = None;
            }
        }
        let anchor = match &replaced_anchor {
            Some(anchor) => anchor.as_ref(),
            None => anchor,
        };

        let outcome = match new.node_type() {
            NodeType::Text => self.process_text(old, new, container, anchor),
            NodeType::Comment => self.process_comment(old, new, container, anchor),
            NodeType::Fragment => self.process_fragment(old, new, container, anchor),
            NodeType::Element(tag) => match old {
                None => self.mount_element(tag, new, container, anchor),
                Some(old) => self.patch_element(old, new),
            },
            NodeType::Component(def) => match old {
                None => self.mount_component(def, new, container, anchor),
                Some(old) => self.update_component(old, new),
            },
        };
        outcome?;

        if let Some(old) = old {
            old.set_mounted(false);
        }
        new.set_mounted(true);
        Ok(())
    }

    fn process_text(
        &self,
        old: Option<&Node<B>>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        match old {
            None => {
                let el = self.backend.create_text(new.text_content())?;
                new.set_el(Some(el.clone()));
                self.insert(&el, container, anchor)
            }
            Some(old) => {
                let el = old.el().ok_or_else(|| RuntimeError::missing_handle("text"))?;
                new.set_el(Some(el.clone()));
                if old.text_content() != new.text_content() {
                    trace!(text = new.text_content(), "set text");
                    self.backend.set_text(&el, new.text_content())?;
                }
                Ok(())
            }
        }
    }

    fn process_comment(
        &self,
        old: Option<&Node<B>>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        match old {
            None => {
                let el = self.backend.create_comment(new.text_content())?;
                new.set_el(Some(el.clone()));
                self.insert(&el, container, anchor)
            }
            Some(old) => {
                new.set_el(old.el());
                Ok(())
            }
        }
    }

    fn process_fragment(
        self: &Arc<Self>,
        old: Option<&Node<B>>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        match old {
            None => {
                let start = self.backend.create_text("")?;
                let end = self.backend.create_text("")?;
                new.set_el(Some(start.clone()));
                new.set_anchor(Some(end.clone()));
                self.insert(&start, container, anchor)?;
                self.insert(&end, container, anchor)?;
                match new.children() {
                    Children::Array(children) => {
                        self.mount_children(children, container, Some(&end))
                    }
                    _ => Ok(()),
                }
            }
            Some(old) => {
                let end = old
                    .anchor()
                    .ok_or(RuntimeError::MissingHandle {
                        node: "fragment",
                        what: "end marker",
                    })?;
                new.set_el(old.el());
                new.set_anchor(Some(end.clone()));
                self.patch_children(old, new, container, Some(&end))
            }
        }
    }

    fn mount_element(
        self: &Arc<Self>,
        tag: &str,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let el = self.backend.create_element(tag)?;
        trace!(tag, "create element");
        new.set_el(Some(el.clone()));

        patch_props(&self.backend, &el, None, new.props())?;

        match new.children() {
            Children::None => {}
            Children::Text(text) => self.backend.set_element_text(&el, text)?,
            Children::Array(children) => self.mount_children(children, &el, None)?,
        }

        self.insert(&el, container, anchor)
    }

    fn patch_element(self: &Arc<Self>, old: &Node<B>, new: &Node<B>) -> Result<()> {
        let el = old
            .el()
            .ok_or_else(|| RuntimeError::missing_handle("element"))?;
        new.set_el(Some(el.clone()));
        self.patch_children(old, new, &el, None)?;
        patch_props(&self.backend, &el, old.props(), new.props())?;
        Ok(())
    }

    pub(crate) fn mount_children(
        self: &Arc<Self>,
        children: &[Node<B>],
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        for child in children {
            self.patch(None, child, container, anchor)?;
        }
        Ok(())
    }

    fn mount_component(
        self: &Arc<Self>,
        def: &ComponentDef<B::Handle>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let instance = ComponentInstance::new(def, new);
        new.set_component(Arc::clone(&instance));

        let renderer: Weak<Self> = Arc::downgrade(self);
        let weak_instance = Arc::downgrade(&instance);
        let container = container.clone();
        // Only the first render inserts at the mount anchor. Later renders
        // locate themselves from the previous subtree.
        let mount_anchor = Mutex::new(anchor.cloned());
        let job_id = instance.job_id();

        let effect = Effect::with_scheduler(
            move || {
                let (Some(renderer), Some(instance)) = (renderer.upgrade(), weak_instance.upgrade())
                else {
                    return Ok(());
                };
                let anchor = mount_anchor.lock().take();
                renderer.render_component(&instance, &container, anchor.as_ref())
            },
            move |effect: &Effect<Result<()>>| {
                let weak = effect.downgrade();
                let job = Job::new(job_id, move || match weak.upgrade() {
                    Some(effect) => effect.run(),
                    None => Ok(()),
                })
                .with_owner(effect.as_subscriber());
                scheduler::queue_job(job);
            },
        );

        instance.install_effect(effect).run()
    }

    /// Body of a component's render effect.
    fn render_component(
        self: &Arc<Self>,
        instance: &Arc<ComponentInstance<B::Handle>>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let next = instance.render_subtree();

        if !instance.is_mounted() {
            self.patch(None, &next, container, anchor)?;
            instance.replace_subtree(Some(Arc::clone(&next)));
            instance.set_mounted(true);
            debug!(component = instance.name(), "component mounted");
        } else {
            let prev = instance
                .subtree()
                .ok_or(RuntimeError::MissingHandle {
                    node: "component",
                    what: "rendered subtree",
                })?;
            // The subtree may have been moved since mount.
            let container = self
                .first_host(&prev)
                .and_then(|el| self.backend.parent_node(&el))
                .unwrap_or_else(|| container.clone());
            let anchor = self.next_host_node(&prev, anchor);
            self.patch(Some(&prev), &next, &container, anchor.as_ref())?;
            instance.replace_subtree(Some(Arc::clone(&next)));
            debug!(component = instance.name(), "component updated");
        }

        if let Some(placeholder) = instance.placeholder() {
            placeholder.set_el(self.first_host(&next));
        }
        Ok(())
    }

    fn update_component(&self, old: &Node<B>, new: &Node<B>) -> Result<()> {
        let instance = old.component().ok_or(RuntimeError::MissingHandle {
            node: "component",
            what: "component instance",
        })?;
        new.set_component(Arc::clone(&instance));
        instance.set_placeholder(new);

        if instance.replace_props(new.props()) {
            instance.update()
        } else {
            new.set_el(old.el());
            Ok(())
        }
    }

    /// Tear down `node`. Only the topmost host nodes are detached when
    /// `remove` is set; descendants are walked to stop component effects.
    pub(crate) fn unmount(&self, node: &Node<B>, remove: bool) -> Result<()> {
        node.set_mounted(false);
        match node.node_type() {
            NodeType::Component(_) => {
                if let Some(instance) = node.component() {
                    debug!(component = instance.name(), "component unmounted");
                    if let Some(subtree) = instance.teardown() {
                        self.unmount(&subtree, remove)?;
                    }
                }
            }
            NodeType::Fragment => {
                if let Children::Array(children) = node.children() {
                    for child in children {
                        self.unmount(child, remove)?;
                    }
                }
                if remove {
                    self.remove_host(node)?;
                    let end = node.anchor().ok_or(RuntimeError::MissingHandle {
                        node: "fragment",
                        what: "end marker",
                    })?;
                    self.backend.remove(&end)?;
                }
            }
            NodeType::Element(_) => {
                if let Children::Array(children) = node.children() {
                    for child in children {
                        self.unmount(child, false)?;
                    }
                }
                if remove {
                    self.remove_host(node)?;
                }
            }
            NodeType::Text | NodeType::Comment => {
                if remove {
                    self.remove_host(node)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn unmount_children(&self, children: &[Node<B>]) -> Result<()> {
        for child in children {
            self.unmount(child, true)?;
        }
        Ok(())
    }

    fn remove_host(&self, node: &Node<B>) -> Result<()> {
        let el = node
            .el()
            .ok_or_else(|| RuntimeError::missing_handle(node.label()))?;
        trace!(node = ?el, "remove");
        self.backend.remove(&el)?;
        Ok(())
    }

    /// Reinsert every host node of `node` before `anchor`.
    pub(crate) fn move_node(
        &self,
        node: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        match node.node_type() {
            NodeType::Component(_) => {
                if let Some(subtree) = node.component().and_then(|instance| instance.subtree()) {
                    self.move_node(&subtree, container, anchor)?;
                }
                Ok(())
            }
            NodeType::Fragment => {
                let (Some(start), Some(end)) = (node.el(), node.anchor()) else {
                    return Err(RuntimeError::missing_handle("fragment"));
                };
                self.insert(&start, container, anchor)?;
                if let Children::Array(children) = node.children() {
                    for child in children {
                        self.move_node(child, container, anchor)?;
                    }
                }
                self.insert(&end, container, anchor)
            }
            _ => {
                let el = node
                    .el()
                    .ok_or_else(|| RuntimeError::missing_handle(node.label()))?;
                trace!(node = ?el, "move");
                self.insert(&el, container, anchor)
            }
        }
    }

    fn insert(
        &self,
        el: &B::Handle,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        trace!(node = ?el, parent = ?container, anchor = ?anchor, "insert");
        self.backend.insert(el, container, anchor)?;
        Ok(())
    }

    /// First host node produced by `node`, in document order.
    pub(crate) fn first_host(&self, node: &Node<B>) -> Option<B::Handle> {
        match node.node_type() {
            NodeType::Component(_) => node
                .component()
                .and_then(|instance| instance.subtree())
                .and_then(|subtree| self.first_host(&subtree)),
            _ => node.el(),
        }
    }

    fn last_host(&self, node: &Node<B>) -> Option<B::Handle> {
        match node.node_type() {
            NodeType::Component(_) => node
                .component()
                .and_then(|instance| instance.subtree())
                .and_then(|subtree| self.last_host(&subtree)),
            NodeType::Fragment => node.anchor(),
            _ => node.el(),
        }
    }

    /// First host node produced by any of `nodes`.
    pub(crate) fn first_host_in(&self, nodes: &[Node<B>]) -> Option<B::Handle> {
        nodes.iter().find_map(|node| self.first_host(node))
    }

    /// The host node right after everything `node` produced. Falls back to
    /// `fallback` when `node` produced nothing.
    pub(crate) fn next_host_node(
        &self,
        node: &Node<B>,
        fallback: Option<&B::Handle>,
    ) -> Option<B::Handle> {
        match self.last_host(node) {
            Some(last) => self.backend.next_sibling(&last),
            None => fallback.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Object;
    use crate::render::MemoryBackend;
    use crate::vdom::{comment, component, fragment, h, props, text};

    fn setup() -> (Renderer<MemoryBackend>, crate::render::NodeId) {
        let renderer = create_renderer(MemoryBackend::new());
        let root = renderer.backend().create_root();
        (renderer, root)
    }

    #[test]
    fn mounts_elements_with_props_and_children() {
        let (renderer, root) = setup();
        let tree = h(
            "div",
            Some(props([("id", "app")])),
            vec![h("p", None, "hello"), text("!"), comment("end")],
        );
        renderer.render(Some(tree), &root).unwrap();

        assert_eq!(
            renderer.backend().inner_markup(root),
            "<div id=\"app\"><p>hello</p>!<!--end--></div>"
        );
    }

    #[test]
    fn text_update_reuses_handle() {
        let (renderer, root) = setup();
        let first = text("a");
        renderer.render(Some(first.clone()), &root).unwrap();
        let handle = first.el();

        let second = text("b");
        renderer.render(Some(second.clone()), &root).unwrap();
        assert_eq!(second.el(), handle);
        assert_eq!(renderer.backend().inner_markup(root), "b");

        renderer.backend().clear_ops();
        renderer.render(Some(text("b")), &root).unwrap();
        assert_eq!(renderer.backend().counts().total(), 0);
    }

    #[test]
    fn type_change_replaces_in_place() {
        let (renderer, root) = setup();
        let list = |middle: Node<MemoryBackend>| {
            h(
                "div",
                None,
                vec![h("i", None, "1"), middle, h("i", None, "3")],
            )
        };
        renderer.render(Some(list(h("b", None, "2"))), &root).unwrap();
        renderer.render(Some(list(h("u", None, "2"))), &root).unwrap();

        assert_eq!(
            renderer.backend().inner_markup(root),
            "<div><i>1</i><u>2</u><i>3</i></div>"
        );
    }

    #[test]
    fn fragments_mount_and_unmount_their_children() {
        let (renderer, root) = setup();
        renderer
            .render(Some(fragment(vec![text("a"), text("b")])), &root)
            .unwrap();
        assert_eq!(renderer.backend().inner_markup(root), "ab");

        renderer
            .render(Some(fragment(vec![text("a"), text("c"), text("d")])), &root)
            .unwrap();
        assert_eq!(renderer.backend().inner_markup(root), "acd");

        renderer.render(None, &root).unwrap();
        assert_eq!(renderer.backend().inner_markup(root), "");
        assert!(renderer.root(&root).is_none());
    }

    #[test]
    fn component_renders_and_rerenders_on_flush() {
        let (renderer, root) = setup();
        let counter = crate::vdom::ComponentDef::with_data(
            "Counter",
            |_| Object::new().with("count", 0),
            |cx| h("span", None, cx.state.get("count")),
        );
        let placeholder = component(&counter, None);
        renderer.render(Some(placeholder.clone()), &root).unwrap();
        assert_eq!(renderer.backend().inner_markup(root), "<span>0</span>");

        let instance = placeholder.component().unwrap();
        instance.state().set("count", 1);
        instance.state().set("count", 2);
        assert_eq!(renderer.backend().inner_markup(root), "<span>0</span>");

        scheduler::flush_all().unwrap();
        assert_eq!(renderer.backend().inner_markup(root), "<span>2</span>");
        assert_eq!(instance.effect().unwrap().run_count(), 2);
        assert_eq!(placeholder.el(), instance.subtree().unwrap().el());
    }

    #[test]
    fn backend_failures_propagate() {
        let (renderer, root) = setup();
        renderer.backend().fail_on(Some("create_element"));
        let err = renderer
            .render(Some(h("div", None, ())), &root)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Backend(_)));
    }
}
