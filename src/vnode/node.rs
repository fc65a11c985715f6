//! Virtual nodes.
//!
//! A [`VNode`] is an immutable description of one node of the UI tree plus
//! the host bookkeeping the renderer attaches once it is mounted. Nodes are
//! reference counted; cloning a vnode shares it.

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::block;
use super::flags::{PatchFlags, ShapeFlags};
use super::normalize::{normalize_class, normalize_style};
use super::props::{PropValue, Props};
use crate::component::{with_ctx, Component, InstanceId};
use crate::renderer::HostNode;

/// Element tag name.
pub type Tag = Cow<'static, str>;

// =============================================================================
// Keys
// =============================================================================

/// Sibling identity for keyed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_MIN_F: f64 = i64::MIN as f64;
const I64_MAX_F: f64 = i64::MAX as f64;

impl Key {
    fn from_prop(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Int(i) => Some(Key::Int(*i)),
            PropValue::Str(s) => Some(Key::Str(s.as_str().into())),
            PropValue::Float(x) if x.fract() == 0.0 && (I64_MIN_F..I64_MAX_F).contains(x) => {
                Some(Key::Int(*x as i64))
            }
            PropValue::Float(x) if x.is_finite() => Some(Key::Str(x.to_string().into())),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s.into())
    }
}

// =============================================================================
// Slots & Children
// =============================================================================

/// Slot function: produces children from slot props.
pub type Slot = Rc<dyn Fn(&Props) -> Vec<VNode>>;

/// Named slot functions passed to a component.
#[derive(Clone, Default)]
pub struct Slots {
    slots: IndexMap<String, Slot>,
    stable: bool,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the slots as never changing between parent renders.
    pub fn stable(mut self) -> Self {
        self.stable = true;
        self
    }

    /// Add a slot. The function renders in the context of the instance that
    /// is rendering now.
    pub fn with(mut self, name: impl Into<String>, slot: impl Fn(&Props) -> Vec<VNode> + 'static) -> Self {
        self.slots.insert(name.into(), with_ctx(slot));
        self
    }

    /// Add the `default` slot.
    pub fn default_slot(self, slot: impl Fn(&Props) -> Vec<VNode> + 'static) -> Self {
        self.with("default", slot)
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("names", &self.slots.keys().collect::<Vec<_>>())
            .field("stable", &self.stable)
            .finish()
    }
}

/// Children of a vnode.
#[derive(Clone, Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(String),
    Nodes(Vec<VNode>),
    Slots(Slots),
}

impl Children {
    pub fn nodes(&self) -> &[VNode] {
        match self {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Children::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for Children {
    fn from(s: &str) -> Self {
        Children::Text(s.to_string())
    }
}

impl From<String> for Children {
    fn from(s: String) -> Self {
        Children::Text(s)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(nodes)
    }
}

impl From<Slots> for Children {
    fn from(slots: Slots) -> Self {
        Children::Slots(slots)
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

// =============================================================================
// VNode
// =============================================================================

/// Node kind.
#[derive(Clone)]
pub enum VNodeKind {
    Element(Tag),
    Component(Component),
    Text,
    Comment,
    Fragment,
}

impl VNodeKind {
    /// Kind equality. Components compare by definition identity.
    pub fn same(&self, other: &VNodeKind) -> bool {
        match (self, other) {
            (VNodeKind::Element(a), VNodeKind::Element(b)) => a == b,
            (VNodeKind::Component(a), VNodeKind::Component(b)) => Rc::ptr_eq(a, b),
            (VNodeKind::Text, VNodeKind::Text)
            | (VNodeKind::Comment, VNodeKind::Comment)
            | (VNodeKind::Fragment, VNodeKind::Fragment) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeKind::Element(tag) => write!(f, "Element({tag})"),
            VNodeKind::Component(def) => write!(f, "Component({})", def.name()),
            VNodeKind::Text => f.write_str("Text"),
            VNodeKind::Comment => f.write_str("Comment"),
            VNodeKind::Fragment => f.write_str("Fragment"),
        }
    }
}

struct VNodeData {
    kind: VNodeKind,
    key: Option<Key>,
    props: Props,
    children: Children,
    patch_flag: PatchFlags,
    dynamic_props: Vec<String>,
    dynamic_children: Option<Vec<VNode>>,
    shape: ShapeFlags,
    // Host bookkeeping, written by the renderer.
    el: Cell<Option<HostNode>>,
    anchor: Cell<Option<HostNode>>,
    component: Cell<Option<InstanceId>>,
}

/// A virtual node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    /// Assemble a node, normalize props and register it with the open block.
    pub(crate) fn assemble(parts: VNodeBuilder, dynamic_children: Option<Vec<VNode>>) -> VNode {
        let VNodeBuilder {
            kind,
            mut key,
            mut props,
            children,
            patch_flag,
            dynamic_props,
        } = parts;

        if let Some(raw) = props.shift_remove("key") {
            key = key.or_else(|| Key::from_prop(&raw));
        }
        normalize_props(&mut props);
        let children = normalize_children(&kind, children);

        let mut shape = match kind {
            VNodeKind::Element(_) => ShapeFlags::ELEMENT,
            VNodeKind::Component(_) => ShapeFlags::COMPONENT,
            _ => ShapeFlags::empty(),
        };
        shape |= match children {
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::Nodes(_) => ShapeFlags::ARRAY_CHILDREN,
            Children::Slots(_) => ShapeFlags::SLOTS_CHILDREN,
            Children::None => ShapeFlags::empty(),
        };

        let is_block = dynamic_children.is_some();
        let vnode = VNode(Rc::new(VNodeData {
            kind,
            key,
            props,
            children,
            patch_flag,
            dynamic_props,
            dynamic_children,
            shape,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: Cell::new(None),
        }));

        // A block root's own block is already closed here, so it lands in
        // the enclosing one.
        if is_block || vnode.tracks_in_block() {
            block::track_vnode(&vnode);
        }
        vnode
    }

    fn tracks_in_block(&self) -> bool {
        self.is_component() || self.0.patch_flag.tracks_in_block()
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.0.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.0.props.get(name)
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn patch_flag(&self) -> PatchFlags {
        self.0.patch_flag
    }

    pub fn dynamic_props(&self) -> &[String] {
        &self.0.dynamic_props
    }

    /// Dynamic descendants collected when this node was created as a block.
    pub fn dynamic_children(&self) -> Option<&[VNode]> {
        self.0.dynamic_children.as_deref()
    }

    pub fn is_block(&self) -> bool {
        self.0.dynamic_children.is_some()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    pub fn is_component(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Component(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Fragment)
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Text of a text or comment node.
    pub fn text_content(&self) -> &str {
        self.0.children.text().unwrap_or("")
    }

    /// Slots passed to a component node.
    pub fn slots(&self) -> Slots {
        match &self.0.children {
            Children::Slots(slots) => slots.clone(),
            _ => Slots::default(),
        }
    }

    /// Host node: the element, text node, or a fragment's start anchor.
    pub fn el(&self) -> Option<HostNode> {
        self.0.el.get()
    }

    /// A fragment's end anchor.
    pub fn anchor(&self) -> Option<HostNode> {
        self.0.anchor.get()
    }

    /// Instance rendering this component node.
    pub fn component(&self) -> Option<InstanceId> {
        self.0.component.get()
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    pub(crate) fn set_el(&self, el: Option<HostNode>) {
        self.0.el.set(el);
    }

    pub(crate) fn set_anchor(&self, anchor: Option<HostNode>) {
        self.0.anchor.set(anchor);
    }

    pub(crate) fn set_component(&self, id: Option<InstanceId>) {
        self.0.component.set(id);
    }

    /// Same kind and same key: patchable in place.
    pub fn is_same_type(&self, other: &VNode) -> bool {
        self.0.key == other.0.key && self.0.kind.same(&other.0.kind)
    }

    /// Same allocation.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.0.kind);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.patch_flag.is_empty() {
            s.field("patch_flag", &self.0.patch_flag);
        }
        s.field("children", &self.0.children);
        s.finish()
    }
}

fn normalize_props(props: &mut Props) {
    if let Some(class) = props.get_mut("class") {
        if !matches!(class, PropValue::Str(_)) {
            *class = PropValue::Str(normalize_class(class));
        }
    }
    if let Some(style) = props.get_mut("style") {
        if let Some(map) = normalize_style(style) {
            *style = PropValue::Map(map);
        }
    }
}

fn normalize_children(kind: &VNodeKind, children: Children) -> Children {
    match (kind, children) {
        // Fragments always hold a node list.
        (VNodeKind::Fragment, Children::Text(t)) => {
            Children::Nodes(vec![VNodeBuilder::new(VNodeKind::Text).children(t).build()])
        }
        (VNodeKind::Fragment, Children::None) => Children::Nodes(Vec::new()),
        // Plain children of a component become its default slot.
        (VNodeKind::Component(_), Children::Nodes(nodes)) => {
            block::untrack_subtree(&nodes);
            Children::Slots(Slots::new().default_slot(move |_| nodes.clone()))
        }
        (VNodeKind::Component(_), Children::Text(t)) => Children::Slots(
            Slots::new().default_slot(move |_| vec![text(t.clone())]),
        ),
        (_, children) => children,
    }
}

// =============================================================================
// Construction
// =============================================================================

/// Incremental vnode construction.
#[derive(Clone)]
pub struct VNodeBuilder {
    kind: VNodeKind,
    key: Option<Key>,
    props: Props,
    children: Children,
    patch_flag: PatchFlags,
    dynamic_props: Vec<String>,
}

impl VNodeBuilder {
    pub fn new(kind: VNodeKind) -> Self {
        Self {
            kind,
            key: None,
            props: Props::new(),
            children: Children::None,
            patch_flag: PatchFlags::empty(),
            dynamic_props: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props.extend(props);
        self
    }

    pub fn children(mut self, children: impl Into<Children>) -> Self {
        self.children = children.into();
        self
    }

    /// Append one child node.
    pub fn child(mut self, child: VNode) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.push(child),
            _ => self.children = Children::Nodes(vec![child]),
        }
        self
    }

    pub fn patch_flag(mut self, flag: PatchFlags) -> Self {
        self.patch_flag |= flag;
        self
    }

    /// Names of props that may change; implies [`PatchFlags::PROPS`].
    pub fn dynamic_props<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.dynamic_props.extend(names.into_iter().map(Into::into));
        self.patch_flag |= PatchFlags::PROPS;
        self
    }

    pub fn build(self) -> VNode {
        VNode::assemble(self, None)
    }
}

/// Start an element.
pub fn element(tag: impl Into<Tag>) -> VNodeBuilder {
    VNodeBuilder::new(VNodeKind::Element(tag.into()))
}

/// Start a component node.
pub fn component(def: &Component) -> VNodeBuilder {
    VNodeBuilder::new(VNodeKind::Component(def.clone()))
}

/// Create a node of any kind.
pub fn create_vnode(kind: VNodeKind, props: Props, children: impl Into<Children>) -> VNode {
    VNodeBuilder::new(kind).props(props).children(children).build()
}

/// Element shorthand. A `key` prop becomes the node key.
pub fn h(tag: impl Into<Tag>, props: Props, children: impl Into<Children>) -> VNode {
    create_vnode(VNodeKind::Element(tag.into()), props, children)
}

/// Component shorthand.
pub fn h_component(def: &Component, props: Props, children: impl Into<Children>) -> VNode {
    create_vnode(VNodeKind::Component(def.clone()), props, children)
}

/// Static text node.
pub fn text(content: impl Into<String>) -> VNode {
    VNodeBuilder::new(VNodeKind::Text)
        .children(content.into())
        .build()
}

/// Text node whose content changes between renders.
pub fn dynamic_text(content: impl Into<String>) -> VNode {
    VNodeBuilder::new(VNodeKind::Text)
        .children(content.into())
        .patch_flag(PatchFlags::TEXT)
        .build()
}

pub fn comment(content: impl Into<String>) -> VNode {
    VNodeBuilder::new(VNodeKind::Comment)
        .children(content.into())
        .build()
}

/// Fragment of sibling nodes.
pub fn fragment(children: Vec<VNode>) -> VNode {
    VNodeBuilder::new(VNodeKind::Fragment)
        .children(children)
        .build()
}

/// Start a fragment.
pub fn fragment_builder() -> VNodeBuilder {
    VNodeBuilder::new(VNodeKind::Fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::props;

    #[test]
    fn test_key_prop_extracted() {
        let n = h("li", props([("key", PropValue::from(3)), ("id", "x".into())]), "three");
        assert_eq!(n.key(), Some(&Key::Int(3)));
        assert!(n.prop("key").is_none());
        assert_eq!(n.props().len(), 1);
    }

    #[test]
    fn test_large_float_keys_stay_distinct() {
        let a = h("li", props([("key", PropValue::Float(1e19))]), ());
        let b = h("li", props([("key", PropValue::Float(2e19))]), ());
        assert_ne!(a.key(), b.key());
        assert!(matches!(a.key(), Some(Key::Str(_))));
        let c = h("li", props([("key", PropValue::Float(42.0))]), ());
        assert_eq!(c.key(), Some(&Key::Int(42)));
    }

    #[test]
    fn test_shape_flags() {
        let n = h("p", Props::new(), "hi");
        assert_eq!(n.shape(), ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN);
        let list = h("ul", Props::new(), vec![text("a")]);
        assert!(list.shape().contains(ShapeFlags::ARRAY_CHILDREN));
    }

    #[test]
    fn test_class_and_style_normalized() {
        let n = element("div")
            .prop("class", PropValue::List(vec!["a".into(), "b".into()]))
            .prop("style", "color: red")
            .build();
        assert_eq!(n.prop("class"), Some(&PropValue::from("a b")));
        assert!(matches!(n.prop("style"), Some(PropValue::Map(_))));
    }

    #[test]
    fn test_same_type_requires_key_match() {
        let a = element("li").key(1).build();
        let b = element("li").key(1).build();
        let c = element("li").key(2).build();
        let d = element("p").key(1).build();
        assert!(a.is_same_type(&b));
        assert!(!a.is_same_type(&c));
        assert!(!a.is_same_type(&d));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_fragment_children_normalized() {
        let f = fragment_builder().children("x").build();
        assert_eq!(f.children().nodes().len(), 1);
    }

    #[test]
    fn test_dynamic_props_imply_props_flag() {
        let n = element("input").prop("value", "a").dynamic_props(["value"]).build();
        assert!(n.patch_flag().contains(PatchFlags::PROPS));
        assert_eq!(n.dynamic_props(), ["value".to_string()]);
    }
}
