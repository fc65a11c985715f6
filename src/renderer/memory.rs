//! In-memory platform adapter.
//!
//! Keeps a host tree in a map and records every operation the renderer
//! issues. Used by the test suite and the demos to assert exactly which host
//! calls a patch produced.
//!
//! ```ignore
//! let mut adapter = MemoryAdapter::new();
//! let root = adapter.create_root();
//! let renderer = Renderer::new(adapter);
//! renderer.render(Some(view), root)?;
//! renderer.with_adapter(|a| assert_eq!(a.inner_markup(root), "<p>hi</p>"));
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;

use super::adapter::{AdapterResult, HostNode, PlatformAdapter};
use crate::error::AdapterError;
use crate::vnode::{stringify_style, PropValue};

/// A recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    CreateComment { node: HostNode },
    SetText { node: HostNode, text: String },
    SetElementText { node: HostNode, text: String },
    /// `moved` is set when the node was already attached.
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        moved: bool,
    },
    Remove { node: HostNode },
    PatchProp { node: HostNode, key: String },
}

/// Contents of one host node.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryNodeKind {
    Element {
        tag: String,
        props: IndexMap<String, PropValue>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub kind: MemoryNodeKind,
    pub parent: Option<HostNode>,
    pub children: Vec<HostNode>,
}

/// Host tree kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    nodes: HashMap<HostNode, MemoryNode>,
    next_id: u64,
    ops: Vec<HostOp>,
    fail_on: Option<&'static str>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: MemoryNodeKind) -> HostNode {
        let node = HostNode(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            node,
            MemoryNode {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        node
    }

    /// Create a detached container element. Not recorded as an operation.
    pub fn create_root(&mut self) -> HostNode {
        self.alloc(MemoryNodeKind::Element {
            tag: "root".into(),
            props: IndexMap::new(),
        })
    }

    /// Make the next call of operation `op` fail (`"insert"`, `"remove"`, ...).
    pub fn fail_next(&mut self, op: &'static str) {
        self.fail_on = Some(op);
    }

    fn check(&mut self, op: &'static str) -> AdapterResult<()> {
        if self.fail_on == Some(op) {
            self.fail_on = None;
            return Err(AdapterError::new(op, "injected failure"));
        }
        Ok(())
    }

    fn node_mut(&mut self, op: &'static str, node: HostNode) -> AdapterResult<&mut MemoryNode> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| AdapterError::new(op, format!("unknown node {node}")))
    }

    fn detach(&mut self, node: HostNode) -> bool {
        let parent = self.nodes.get(&node).and_then(|n| n.parent);
        let Some(parent) = parent else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = None;
        }
        true
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Inserts of nodes that were already attached.
    pub fn move_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Insert { moved: true, .. }))
    }

    pub fn prop_patch_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::PatchProp { .. }))
    }

    pub fn text_patch_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::SetText { .. } | HostOp::SetElementText { .. }))
    }

    pub fn count(&self, pred: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    pub fn node(&self, node: HostNode) -> Option<&MemoryNode> {
        self.nodes.get(&node)
    }

    pub fn children_of(&self, node: HostNode) -> &[HostNode] {
        self.nodes.get(&node).map_or(&[], |n| n.children.as_slice())
    }

    pub fn prop_of(&self, node: HostNode, key: &str) -> Option<&PropValue> {
        match &self.nodes.get(&node)?.kind {
            MemoryNodeKind::Element { props, .. } => props.get(key),
            _ => None,
        }
    }

    /// Serialize `node` and its subtree.
    pub fn to_markup(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    /// Serialize the children of `node`.
    pub fn inner_markup(&self, node: HostNode) -> String {
        let mut out = String::new();
        for child in self.children_of(node) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    fn write_markup(&self, node: HostNode, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            MemoryNodeKind::Text(text) => out.push_str(text),
            MemoryNodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            MemoryNodeKind::Element { tag, props } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in props {
                    write_attr(key, value, out);
                }
                out.push('>');
                for child in &n.children {
                    self.write_markup(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn write_attr(key: &str, value: &PropValue, out: &mut String) {
    let rendered = match value {
        PropValue::Handler(_) | PropValue::Null | PropValue::Bool(false) => return,
        PropValue::Bool(true) => {
            out.push(' ');
            out.push_str(key);
            return;
        }
        PropValue::Map(style) => stringify_style(style),
        other => other.to_string(),
    };
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&rendered);
    out.push('"');
}

impl PlatformAdapter for MemoryAdapter {
    fn create_element(&mut self, tag: &str) -> AdapterResult<HostNode> {
        self.check("create_element")?;
        let node = self.alloc(MemoryNodeKind::Element {
            tag: tag.to_string(),
            props: IndexMap::new(),
        });
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        Ok(node)
    }

    fn create_text(&mut self, text: &str) -> AdapterResult<HostNode> {
        self.check("create_text")?;
        let node = self.alloc(MemoryNodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        Ok(node)
    }

    fn create_comment(&mut self, text: &str) -> AdapterResult<HostNode> {
        self.check("create_comment")?;
        let node = self.alloc(MemoryNodeKind::Comment(text.to_string()));
        self.ops.push(HostOp::CreateComment { node });
        Ok(node)
    }

    fn set_text(&mut self, node: HostNode, text: &str) -> AdapterResult<()> {
        self.check("set_text")?;
        match &mut self.node_mut("set_text", node)?.kind {
            MemoryNodeKind::Text(t) | MemoryNodeKind::Comment(t) => *t = text.to_string(),
            MemoryNodeKind::Element { .. } => {
                return Err(AdapterError::new("set_text", format!("{node} is an element")));
            }
        }
        self.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    fn set_element_text(&mut self, node: HostNode, text: &str) -> AdapterResult<()> {
        self.check("set_element_text")?;
        let children = std::mem::take(&mut self.node_mut("set_element_text", node)?.children);
        for child in children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = None;
            }
        }
        if !text.is_empty() {
            let child = self.alloc(MemoryNodeKind::Text(text.to_string()));
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = Some(node);
            }
            self.node_mut("set_element_text", node)?.children.push(child);
        }
        self.ops.push(HostOp::SetElementText {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) -> AdapterResult<()> {
        self.check("insert")?;
        if !self.nodes.contains_key(&node) {
            return Err(AdapterError::new("insert", format!("unknown node {node}")));
        }
        let moved = self.detach(node);
        let target = self.node_mut("insert", parent)?;
        let index = match anchor {
            Some(anchor) => target
                .children
                .iter()
                .position(|c| *c == anchor)
                .ok_or_else(|| AdapterError::new("insert", format!("anchor {anchor} is not a child of {parent}")))?,
            None => target.children.len(),
        };
        target.children.insert(index, node);
        self.node_mut("insert", node)?.parent = Some(parent);
        self.ops.push(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
        Ok(())
    }

    fn remove(&mut self, node: HostNode) -> AdapterResult<()> {
        self.check("remove")?;
        self.detach(node);
        self.ops.push(HostOp::Remove { node });
        Ok(())
    }

    fn patch_prop(
        &mut self,
        node: HostNode,
        key: &str,
        _prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> AdapterResult<()> {
        self.check("patch_prop")?;
        match &mut self.node_mut("patch_prop", node)?.kind {
            MemoryNodeKind::Element { props, .. } => match next {
                Some(value) if !value.is_null() => {
                    props.insert(key.to_string(), value.clone());
                }
                _ => {
                    props.shift_remove(key);
                }
            },
            _ => {
                return Err(AdapterError::new("patch_prop", format!("{node} is not an element")));
            }
        }
        self.ops.push(HostOp::PatchProp {
            node,
            key: key.to_string(),
        });
        Ok(())
    }

    fn parent_node(&self, node: HostNode) -> Option<HostNode> {
        self.nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_append_and_before_anchor() {
        let mut a = MemoryAdapter::new();
        let root = a.create_root();
        let x = a.create_text("x").unwrap();
        let y = a.create_text("y").unwrap();
        a.insert(x, root, None).unwrap();
        a.insert(y, root, Some(x)).unwrap();
        assert_eq!(a.inner_markup(root), "yx");
        assert_eq!(a.next_sibling(y), Some(x));
        assert_eq!(a.parent_node(x), Some(root));
        assert_eq!(a.move_count(), 0);
    }

    #[test]
    fn test_reinsert_counts_as_move() {
        let mut a = MemoryAdapter::new();
        let root = a.create_root();
        let x = a.create_text("x").unwrap();
        let y = a.create_text("y").unwrap();
        a.insert(x, root, None).unwrap();
        a.insert(y, root, None).unwrap();
        a.insert(y, root, Some(x)).unwrap();
        assert_eq!(a.inner_markup(root), "yx");
        assert_eq!(a.move_count(), 1);
    }

    #[test]
    fn test_markup_renders_props() {
        let mut a = MemoryAdapter::new();
        let root = a.create_root();
        let div = a.create_element("div").unwrap();
        a.patch_prop(div, "id", None, Some(&"main".into())).unwrap();
        a.patch_prop(div, "hidden", None, Some(&true.into())).unwrap();
        a.set_element_text(div, "hi").unwrap();
        a.insert(div, root, None).unwrap();
        assert_eq!(a.to_markup(div), "<div id=\"main\" hidden>hi</div>");

        a.patch_prop(div, "id", None, None).unwrap();
        assert!(a.prop_of(div, "id").is_none());
    }

    #[test]
    fn test_failure_injection() {
        let mut a = MemoryAdapter::new();
        let root = a.create_root();
        a.fail_next("create_element");
        let err = a.create_element("p").unwrap_err();
        assert_eq!(err.op, "create_element");
        assert!(a.create_element("p").is_ok());
        let x = a.create_text("x").unwrap();
        assert!(a.insert(x, root, Some(HostNode(999))).is_err());
    }
}
