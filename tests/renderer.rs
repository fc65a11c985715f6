//! Renderer behavior against the in-memory host.
//!
//! Every test builds a fresh renderer over a `MemoryAdapter` and inspects the
//! resulting markup and the recorded host operations.

use proptest::prelude::*;

use spark_vdom::config::{configure, reset_config, RuntimeConfig};
use spark_vdom::renderer::{HostOp, MemoryAdapter, Renderer};
use spark_vdom::scheduler::reset_scheduler;
use spark_vdom::vnode::{
    block, comment, dynamic_text, element, fragment, h, props, text, PatchFlags, PropValue, Props,
    VNode,
};
use spark_vdom::{HostNode, RuntimeError};

// =============================================================================
// HELPERS
// =============================================================================

fn setup() -> (Renderer<MemoryAdapter>, HostNode) {
    reset_config();
    reset_scheduler();
    let mut adapter = MemoryAdapter::new();
    let root = adapter.create_root();
    (Renderer::new(adapter), root)
}

fn keyed_list(keys: &[i64]) -> VNode {
    let items: Vec<VNode> = keys
        .iter()
        .map(|k| element("li").key(*k).children(k.to_string()).build())
        .collect();
    h("ul", Props::new(), items)
}

fn list_markup(keys: &[i64]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

fn markup(renderer: &Renderer<MemoryAdapter>, root: HostNode) -> String {
    renderer.with_adapter(|a| a.inner_markup(root))
}

fn clear_ops(renderer: &Renderer<MemoryAdapter>) {
    renderer.with_adapter_mut(MemoryAdapter::clear_ops);
}

fn created(renderer: &Renderer<MemoryAdapter>) -> usize {
    renderer.with_adapter(|a| a.count(|op| matches!(op, HostOp::CreateElement { .. })))
}

// =============================================================================
// MOUNT / PATCH BASICS
// =============================================================================

#[test]
fn test_mount_element_tree() {
    let (renderer, root) = setup();
    let view = h(
        "div",
        props([("id", PropValue::from("app")), ("class", PropValue::from(vec!["a", "b"]))]),
        vec![h("span", Props::new(), "hi"), text(" there")],
    );
    renderer.render(Some(view), root).unwrap();
    assert_eq!(
        markup(&renderer, root),
        r#"<div id="app" class="a b"><span>hi</span> there</div>"#
    );
}

#[test]
fn test_props_diff_sets_and_removes() {
    let (renderer, root) = setup();
    renderer
        .render(Some(h("div", props([("title", "a"), ("lang", "en")]), ())), root)
        .unwrap();
    clear_ops(&renderer);

    renderer
        .render(Some(h("div", props([("title", "b")]), ())), root)
        .unwrap();
    assert_eq!(markup(&renderer, root), r#"<div title="b"></div>"#);
    assert_eq!(renderer.with_adapter(MemoryAdapter::prop_patch_count), 2);
}

#[test]
fn test_text_and_array_children_transitions() {
    let (renderer, root) = setup();
    renderer.render(Some(h("p", Props::new(), "text")), root).unwrap();
    renderer
        .render(Some(h("p", Props::new(), vec![text("a"), text("b")])), root)
        .unwrap();
    assert_eq!(markup(&renderer, root), "<p>ab</p>");

    renderer.render(Some(h("p", Props::new(), "again")), root).unwrap();
    assert_eq!(markup(&renderer, root), "<p>again</p>");

    renderer.render(Some(h("p", Props::new(), ())), root).unwrap();
    assert_eq!(markup(&renderer, root), "<p></p>");
}

#[test]
fn test_type_change_replaces_in_place() {
    let (renderer, root) = setup();
    let view = |middle: VNode| h("div", Props::new(), vec![text("a"), middle, text("c")]);
    renderer
        .render(Some(view(h("span", Props::new(), "b"))), root)
        .unwrap();
    renderer
        .render(Some(view(h("em", Props::new(), "b"))), root)
        .unwrap();
    assert_eq!(markup(&renderer, root), "<div>a<em>b</em>c</div>");
}

#[test]
fn test_fragment_mount_patch_unmount() {
    let (renderer, root) = setup();
    renderer
        .render(Some(h("div", Props::new(), vec![fragment(vec![text("x"), text("y")]), text("z")])), root)
        .unwrap();
    assert_eq!(markup(&renderer, root), "<div>xyz</div>");

    renderer
        .render(Some(h("div", Props::new(), vec![fragment(vec![text("y")]), text("z")])), root)
        .unwrap();
    assert_eq!(markup(&renderer, root), "<div>yz</div>");

    renderer.render(None, root).unwrap();
    assert_eq!(markup(&renderer, root), "");
    assert!(renderer.root(root).is_none());
}

#[test]
fn test_same_vnode_is_skipped() {
    let (renderer, root) = setup();
    let view = h("div", Props::new(), vec![comment("static")]);
    renderer.render(Some(view.clone()), root).unwrap();
    clear_ops(&renderer);
    renderer.render(Some(view), root).unwrap();
    assert!(renderer.with_adapter(|a| a.ops().is_empty()));
}

#[test]
fn test_adapter_error_propagates() {
    let (renderer, root) = setup();
    renderer.with_adapter_mut(|a| a.fail_next("insert"));
    let result = renderer.render(Some(h("div", Props::new(), ())), root);
    assert!(matches!(result, Err(RuntimeError::Adapter(e)) if e.op == "insert"));
}

// =============================================================================
// KEYED DIFF
// =============================================================================

#[test]
fn test_keyed_single_swap_is_one_move() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3, 4, 5])), root).unwrap();
    clear_ops(&renderer);

    renderer.render(Some(keyed_list(&[1, 3, 2, 4, 5])), root).unwrap();
    assert_eq!(markup(&renderer, root), list_markup(&[1, 3, 2, 4, 5]));
    assert_eq!(renderer.with_adapter(MemoryAdapter::move_count), 1);
    assert_eq!(created(&renderer), 0);
}

#[test]
fn test_keyed_head_swap_is_one_move() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3])), root).unwrap();
    clear_ops(&renderer);

    renderer.render(Some(keyed_list(&[2, 1, 3])), root).unwrap();
    assert_eq!(markup(&renderer, root), list_markup(&[2, 1, 3]));
    assert_eq!(renderer.with_adapter(MemoryAdapter::move_count), 1);
}

#[test]
fn test_keyed_reverse_moves_all_but_one() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3, 4, 5])), root).unwrap();
    clear_ops(&renderer);

    renderer.render(Some(keyed_list(&[5, 4, 3, 2, 1])), root).unwrap();
    assert_eq!(markup(&renderer, root), list_markup(&[5, 4, 3, 2, 1]));
    assert_eq!(renderer.with_adapter(MemoryAdapter::move_count), 4);
}

#[test]
fn test_keyed_insert_remove_mix() {
    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2, 3, 4])), root).unwrap();
    clear_ops(&renderer);

    renderer.render(Some(keyed_list(&[4, 5, 1])), root).unwrap();
    assert_eq!(markup(&renderer, root), list_markup(&[4, 5, 1]));
    assert_eq!(created(&renderer), 1);
    assert_eq!(
        renderer.with_adapter(|a| a.count(|op| matches!(op, HostOp::Remove { .. }))),
        2
    );
}

#[test]
fn test_keyed_patch_updates_content() {
    let (renderer, root) = setup();
    let list = |label: &str| {
        h(
            "ul",
            Props::new(),
            vec![
                element("li").key("a").children(label.to_string()).build(),
                element("li").key("b").children("b").build(),
            ],
        )
    };
    renderer.render(Some(list("a")), root).unwrap();
    renderer.render(Some(list("A")), root).unwrap();
    assert_eq!(markup(&renderer, root), "<ul><li>A</li><li>b</li></ul>");
}

#[test]
fn test_duplicate_keys_fail() {
    let (renderer, root) = setup();
    let result = renderer.render(Some(keyed_list(&[1, 2, 1])), root);
    assert_eq!(result, Err(RuntimeError::DuplicateKey { key: "1".into() }));

    let (renderer, root) = setup();
    renderer.render(Some(keyed_list(&[1, 2])), root).unwrap();
    let result = renderer.render(Some(keyed_list(&[2, 2])), root);
    assert_eq!(result, Err(RuntimeError::DuplicateKey { key: "2".into() }));
}

#[test]
fn test_keyed_fragment_flag_inside_block() {
    let (renderer, root) = setup();
    let view = |keys: &[i64]| {
        block(|| {
            let items: Vec<VNode> = keys
                .iter()
                .map(|k| element("li").key(*k).children(k.to_string()).build())
                .collect();
            element("ul").child(
                fragment_with_flag(items, PatchFlags::KEYED_FRAGMENT),
            )
        })
    };
    renderer.render(Some(view(&[1, 2, 3])), root).unwrap();
    clear_ops(&renderer);
    renderer.render(Some(view(&[3, 1, 2])), root).unwrap();
    assert_eq!(markup(&renderer, root), list_markup(&[3, 1, 2]));
    assert_eq!(renderer.with_adapter(MemoryAdapter::move_count), 1);
}

fn fragment_with_flag(children: Vec<VNode>, flag: PatchFlags) -> VNode {
    spark_vdom::vnode::fragment_builder()
        .children(children)
        .patch_flag(flag)
        .build()
}

// =============================================================================
// BLOCK TREE
// =============================================================================

fn block_view(label: &str, title: &str) -> VNode {
    block(|| {
        element("div")
            .child(h("h1", props([("title", title)]), "static"))
            .child(
                element("p")
                    .children(label.to_string())
                    .patch_flag(PatchFlags::TEXT)
                    .build(),
            )
    })
}

#[test]
fn test_block_patch_visits_only_dynamic_nodes() {
    let (renderer, root) = setup();
    renderer.render(Some(block_view("one", "t")), root).unwrap();
    clear_ops(&renderer);

    renderer.render(Some(block_view("one", "t")), root).unwrap();
    assert!(renderer.with_adapter(|a| a.ops().is_empty()));

    renderer.render(Some(block_view("two", "t")), root).unwrap();
    assert_eq!(markup(&renderer, root), r#"<div><h1 title="t">static</h1><p>two</p></div>"#);
    let ops = renderer.with_adapter_mut(MemoryAdapter::take_ops);
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::SetElementText { text, .. } if text == "two"));
}

#[test]
fn test_block_tree_skips_unflagged_props() {
    let (renderer, root) = setup();
    renderer.render(Some(block_view("x", "old")), root).unwrap();
    renderer.render(Some(block_view("x", "new")), root).unwrap();
    // Unflagged nodes are static inside a block.
    assert!(markup(&renderer, root).contains(r#"title="old""#));

    configure(RuntimeConfig::default().with_block_tree(false));
    let (renderer, root) = {
        reset_scheduler();
        let mut adapter = MemoryAdapter::new();
        let root = adapter.create_root();
        (Renderer::new(adapter), root)
    };
    renderer.render(Some(block_view("x", "old")), root).unwrap();
    renderer.render(Some(block_view("x", "new")), root).unwrap();
    assert!(markup(&renderer, root).contains(r#"title="new""#));
    reset_config();
}

#[test]
fn test_block_shape_change_falls_back_to_full_diff() {
    let (renderer, root) = setup();
    let view = |extra: bool| {
        block(|| {
            let mut root = element("div").child(dynamic_text("a"));
            if extra {
                root = root.child(dynamic_text("b"));
            }
            root
        })
    };
    renderer.render(Some(view(false)), root).unwrap();
    renderer.render(Some(view(true)), root).unwrap();
    assert_eq!(markup(&renderer, root), "<div>ab</div>");
    renderer.render(Some(view(false)), root).unwrap();
    assert_eq!(markup(&renderer, root), "<div>a</div>");
}

#[test]
fn test_static_nodes_keep_hosts_after_block_patch() {
    let (renderer, root) = setup();
    let view = |n: i64| {
        block(|| {
            spark_vdom::vnode::fragment_builder()
                .child(text("static"))
                .child(dynamic_text(n.to_string()))
                .patch_flag(PatchFlags::STABLE_FRAGMENT)
        })
    };
    renderer.render(Some(view(1)), root).unwrap();
    renderer.render(Some(view(2)), root).unwrap();
    renderer.render(Some(view(3)), root).unwrap();
    assert_eq!(markup(&renderer, root), "static3");

    // Removal must still reach the static text created by the first render.
    renderer.render(None, root).unwrap();
    assert_eq!(markup(&renderer, root), "");
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_keyed_transitions_match_markup(
        before in prop::sample::subsequence((0i64..12).collect::<Vec<_>>(), 0..12).prop_shuffle(),
        after in prop::sample::subsequence((0i64..12).collect::<Vec<_>>(), 0..12).prop_shuffle(),
    ) {
        let (renderer, root) = setup();
        renderer.render(Some(keyed_list(&before)), root).unwrap();
        clear_ops(&renderer);
        renderer.render(Some(keyed_list(&after)), root).unwrap();

        prop_assert_eq!(markup(&renderer, root), list_markup(&after));
        let fresh = after.iter().filter(|k| !before.contains(k)).count();
        prop_assert_eq!(created(&renderer), fresh);
    }
}
