//! Integration Tests for the Renderer
//!
//! These tests drive the renderer through the in-memory backend and check
//! both the resulting markup and the exact backend calls issued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lattice_runtime::reactive::{Object, Value};
use lattice_runtime::render::{create_renderer, MemoryBackend, Node, NodeId, Op, Renderer};
use lattice_runtime::scheduler::flush_all;
use lattice_runtime::vdom::{
    component, fragment, h, props, text, ComponentDef, NodeType, VNode, VNodeRef,
};

type Html = Node<MemoryBackend>;

fn setup() -> (Renderer<MemoryBackend>, NodeId) {
    let renderer = create_renderer(MemoryBackend::new());
    let root = renderer.backend().create_root();
    (renderer, root)
}

fn keyed_list(keys: &[&str]) -> Html {
    let items = keys
        .iter()
        .map(|key| h("li", Some(props([("key", *key)])), key.to_uppercase()))
        .collect::<Vec<_>>();
    h("ul", None, items)
}

fn list_markup(keys: &[&str]) -> String {
    let items: String = keys
        .iter()
        .map(|key| format!("<li>{}</li>", key.to_uppercase()))
        .collect();
    format!("<ul>{items}</ul>")
}

fn rerender(renderer: &Renderer<MemoryBackend>, root: NodeId, from: &[&str], to: &[&str]) {
    renderer.render(Some(keyed_list(from)), &root).unwrap();
    renderer.backend().clear_ops();
    renderer.render(Some(keyed_list(to)), &root).unwrap();
    assert_eq!(renderer.backend().inner_markup(root), list_markup(to));
}

/// Test that swapping two middle items costs exactly one move.
#[test]
fn keyed_swap_is_one_move() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c", "d"], &["a", "c", "b", "d"]);

    let counts = renderer.backend().counts();
    assert_eq!(counts.moves, 1);
    assert_eq!(counts.creates, 0);
    assert_eq!(counts.removes, 0);
    assert_eq!(counts.inserts, 0);
}

/// Test that an insertion costs one create and no moves.
#[test]
fn keyed_insert_is_one_create() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c"], &["a", "x", "b", "c"]);

    let counts = renderer.backend().counts();
    assert_eq!(counts.creates, 1);
    assert_eq!(counts.inserts, 1);
    assert_eq!(counts.moves, 0);
    assert_eq!(counts.removes, 0);
}

/// Test that dropping the head costs one remove and no moves.
#[test]
fn keyed_removal_is_one_remove() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c"], &["b", "c"]);

    let counts = renderer.backend().counts();
    assert_eq!(counts.removes, 1);
    assert_eq!(counts.moves, 0);
    assert_eq!(counts.creates, 0);
}

/// Test that re-rendering the very same node does nothing.
#[test]
fn identical_node_is_a_no_op() {
    let (renderer, root) = setup();
    let tree = keyed_list(&["a", "b"]);
    renderer.render(Some(tree.clone()), &root).unwrap();
    renderer.backend().clear_ops();

    renderer.render(Some(tree), &root).unwrap();
    assert!(renderer.backend().ops().is_empty());
}

/// Test the property diff on an element update.
#[test]
fn property_update_sets_and_removes() {
    let (renderer, root) = setup();
    let first = h("div", Some(props([("class", "a"), ("id", "1")])), ());
    renderer.render(Some(first), &root).unwrap();
    renderer.backend().clear_ops();

    let second = h("div", Some(props([("class", "b")])), ());
    renderer.render(Some(second.clone()), &root).unwrap();

    let ops = renderer.backend().ops();
    let sets: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            Op::PatchProp {
                key,
                next: Some(value),
                ..
            } => Some((key.clone(), value.to_text())),
            _ => None,
        })
        .collect();
    let removals: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            Op::PatchProp {
                key, next: None, ..
            } => Some(key.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(ops.len(), 2);
    assert_eq!(sets, vec![("class".to_owned(), "b".to_owned())]);
    assert_eq!(removals, vec!["id".to_owned()]);

    let el = second.el().unwrap();
    let class = renderer.backend().prop(el, "class").map(|v| v.to_text());
    assert_eq!(class.as_deref(), Some("b"));
}

/// Test that the key never reaches the backend as a property.
#[test]
fn key_is_not_a_property() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a"])), &root).unwrap();
    let has_key_prop = renderer
        .backend()
        .ops()
        .iter()
        .any(|op| matches!(op, Op::PatchProp { key, .. } if key == "key"));
    assert!(!has_key_prop);
}

/// Test that `render(None)` removes everything.
#[test]
fn render_none_unmounts() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b"])), &root).unwrap();
    renderer.render(None, &root).unwrap();

    assert_eq!(renderer.backend().inner_markup(root), "");
    assert!(renderer.root(&root).is_none());

    // Nothing to unmount a second time
    renderer.backend().clear_ops();
    renderer.render(None, &root).unwrap();
    assert!(renderer.backend().ops().is_empty());
}

/// Test that containers are tracked independently.
#[test]
fn containers_are_independent() {
    let (renderer, left) = setup();
    let right = renderer.backend().create_root();

    renderer.render(Some(text("left")), &left).unwrap();
    renderer.render(Some(text("right")), &right).unwrap();
    renderer.render(Some(text("LEFT")), &left).unwrap();

    assert_eq!(renderer.backend().inner_markup(left), "LEFT");
    assert_eq!(renderer.backend().inner_markup(right), "right");
}

/// Test that keyed fragments move as a unit.
#[test]
fn keyed_fragments_move_together() {
    let (renderer, root) = setup();
    let group = |key: &str| -> Html {
        VNode::new(
            NodeType::Fragment,
            Some(props([("key", key)])),
            vec![text(format!("{key}1")), text(format!("{key}2"))],
        )
    };
    let tree = |keys: &[&str]| h("div", None, keys.iter().map(|k| group(k)).collect::<Vec<_>>());

    renderer.render(Some(tree(&["a", "b", "c"])), &root).unwrap();
    renderer.render(Some(tree(&["c", "a", "b"])), &root).unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div>c1c2a1a2b1b2</div>"
    );

    renderer.render(Some(tree(&["c", "b"])), &root).unwrap();
    assert_eq!(renderer.backend().inner_markup(root), "<div>c1c2b1b2</div>");
}

/// Test that an empty keyed fragment matched in the middle of a reorder
/// mounts its new children at its own position.
#[test]
fn empty_fragment_fills_in_place_during_reorder() {
    let (renderer, root) = setup();
    let item = |key: &str| h("li", Some(props([("key", key)])), key);
    let group = |children: Vec<Html>| -> Html {
        VNode::new(NodeType::Fragment, Some(props([("key", "a")])), children)
    };

    renderer
        .render(
            Some(h("ul", None, vec![item("p"), group(vec![]), item("b")])),
            &root,
        )
        .unwrap();
    assert_eq!(renderer.backend().inner_markup(root), "<ul><li>p</li><li>b</li></ul>");

    renderer
        .render(
            Some(h("ul", None, vec![group(vec![text("A")]), item("q"), item("b")])),
            &root,
        )
        .unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<ul>A<li>q</li><li>b</li></ul>"
    );
}

/// Test that a component whose subtree was an empty fragment re-renders
/// before its following sibling.
#[test]
fn component_with_empty_fragment_rerenders_in_place() {
    let (renderer, root) = setup();
    let def: ComponentDef<NodeId> = ComponentDef::with_data(
        "Slot",
        |_| Object::new().with("filled", false),
        |cx| {
            if cx.state.get("filled").as_bool() == Some(true) {
                fragment(vec![text("in")])
            } else {
                fragment(vec![])
            }
        },
    );
    let slot = component(&def, None);
    renderer
        .render(Some(h("div", None, vec![slot.clone(), h("span", None, "after")])), &root)
        .unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div><span>after</span></div>"
    );

    slot.component().unwrap().state().set("filled", true);
    flush_all().unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div>in<span>after</span></div>"
    );
}

/// Test that a node still mounted in one container cannot be mounted in
/// another, and that it can be once it has been unmounted.
#[test]
fn mounted_node_cannot_be_reused_elsewhere() {
    let (renderer, left) = setup();
    let right = renderer.backend().create_root();
    let shared = h("b", None, "shared");
    renderer
        .render(
            Some(h("div", None, vec![h("span", None, "first"), shared.clone()])),
            &left,
        )
        .unwrap();
    assert!(shared.is_mounted());

    let err = renderer
        .render(Some(h("section", None, vec![shared.clone()])), &right)
        .unwrap_err();
    assert!(matches!(
        err,
        lattice_runtime::RuntimeError::NodeReused { node: "element" }
    ));
    assert_eq!(
        renderer.backend().inner_markup(left),
        "<div><span>first</span><b>shared</b></div>"
    );
    assert_eq!(renderer.backend().inner_markup(right), "");

    renderer
        .render(Some(h("div", None, vec![h("span", None, "next")])), &left)
        .unwrap();
    assert_eq!(
        renderer.backend().inner_markup(left),
        "<div><span>next</span></div>"
    );
    assert!(!shared.is_mounted());

    renderer
        .render(Some(h("section", None, vec![shared.clone()])), &right)
        .unwrap();
    assert_eq!(
        renderer.backend().inner_markup(right),
        "<section><b>shared</b></section>"
    );
}

fn counter_def(renders: Arc<AtomicUsize>) -> ComponentDef<NodeId> {
    ComponentDef::with_data(
        "Counter",
        |props| {
            let start = props.get("start").cloned().unwrap_or(Value::from(0));
            Object::new().with("count", start)
        },
        move |cx| {
            renders.fetch_add(1, Ordering::SeqCst);
            let label = cx
                .props
                .get("label")
                .map(Value::to_text)
                .unwrap_or_default();
            h(
                "button",
                None,
                format!("{label}{}", cx.state.get("count")),
            )
        },
    )
}

/// Test that state writes re-render a component once per flush.
#[test]
fn component_rerenders_are_batched() {
    let (renderer, root) = setup();
    let renders = Arc::new(AtomicUsize::new(0));
    let def = counter_def(renders.clone());

    let app = component(&def, Some(props([("start", 1)])));
    renderer.render(Some(app.clone()), &root).unwrap();
    assert_eq!(renderer.backend().inner_markup(root), "<button>1</button>");

    let state = app.component().unwrap().state().clone();
    for n in 2..=10 {
        state.set("count", n);
    }
    flush_all().unwrap();

    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(renderer.backend().inner_markup(root), "<button>10</button>");
}

/// Test that components inside a keyed list keep their state when moved.
#[test]
fn components_keep_state_across_moves() {
    let (renderer, root) = setup();
    let renders = Arc::new(AtomicUsize::new(0));
    let def = counter_def(renders.clone());
    let row = |key: &str| component(&def, Some(props([("key", key), ("label", key)])));
    let list = |keys: &[&str]| -> Html {
        h("div", None, keys.iter().map(|k| row(k)).collect::<Vec<_>>())
    };

    let first = list(&["a", "b"]);
    renderer.render(Some(first.clone()), &root).unwrap();
    let a = first.children().as_array().unwrap()[0].component().unwrap();
    a.state().set("count", 5);
    flush_all().unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div><button>a5</button><button>b0</button></div>"
    );

    renderer.render(Some(list(&["b", "a"])), &root).unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div><button>b0</button><button>a5</button></div>"
    );

    // The moved instance still re-renders in place
    a.state().set("count", 6);
    flush_all().unwrap();
    assert_eq!(
        renderer.backend().inner_markup(root),
        "<div><button>b0</button><button>a6</button></div>"
    );
}

/// Test that new props re-render the same instance.
#[test]
fn component_props_update_reuses_instance() {
    let (renderer, root) = setup();
    let renders = Arc::new(AtomicUsize::new(0));
    let def = counter_def(renders.clone());

    let first = component(&def, Some(props([("label", "x")])));
    renderer.render(Some(first.clone()), &root).unwrap();
    let instance = first.component().unwrap();

    let same = component(&def, Some(props([("label", "x")])));
    renderer.render(Some(same.clone()), &root).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(same.el(), first.el());

    let next = component(&def, Some(props([("label", "y")])));
    renderer.render(Some(next.clone()), &root).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&next.component().unwrap(), &instance));
    assert_eq!(renderer.backend().inner_markup(root), "<button>y0</button>");
}

/// Test that unmounting a component stops its render effect.
#[test]
fn unmounted_component_stops_rendering() {
    let (renderer, root) = setup();
    let renders = Arc::new(AtomicUsize::new(0));
    let def = counter_def(renders.clone());

    let nested: VNodeRef<NodeId> = h("section", None, vec![component(&def, None)]);
    renderer.render(Some(nested.clone()), &root).unwrap();
    let instance = nested.children().as_array().unwrap()[0].component().unwrap();

    renderer.render(Some(h("p", None, "gone")), &root).unwrap();
    assert!(!instance.is_mounted());
    assert!(!instance.effect().unwrap().is_active());

    instance.state().set("count", 1);
    flush_all().unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.backend().inner_markup(root), "<p>gone</p>");
}

/// Test that a component switching its root element is replaced in place.
#[test]
fn component_root_type_change_stays_in_place() {
    let (renderer, root) = setup();
    let def: ComponentDef<NodeId> = ComponentDef::with_data(
        "Toggle",
        |_| Object::new().with("on", false),
        |cx| {
            if cx.state.get("on").as_bool() == Some(true) {
                h("b", None, "on")
            } else {
                h("i", None, "off")
            }
        },
    );
    let toggle = component(&def, None);
    let tree = h(
        "div",
        None,
        vec![text("["), toggle.clone(), fragment(vec![text("]")])],
    );
    renderer.render(Some(tree), &root).unwrap();
    assert_eq!(renderer.backend().inner_markup(root), "<div>[<i>off</i>]</div>");

    toggle.component().unwrap().state().set("on", true);
    flush_all().unwrap();
    assert_eq!(renderer.backend().inner_markup(root), "<div>[<b>on</b>]</div>");
}

/// Test that a failing backend surfaces from the flush.
#[test]
fn backend_failure_surfaces_from_flush() {
    let (renderer, root) = setup();
    let renders = Arc::new(AtomicUsize::new(0));
    let def = counter_def(renders);
    let app = component(&def, None);
    renderer.render(Some(app.clone()), &root).unwrap();

    renderer.backend().fail_on(Some("set_element_text"));
    app.component().unwrap().state().set("count", 3);
    let err = flush_all().unwrap_err();
    assert!(matches!(err, lattice_runtime::RuntimeError::Backend(_)));
}
