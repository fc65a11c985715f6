//! Platform adapter - the host operations the renderer drives.
//!
//! The renderer never touches a real host tree. Everything goes through a
//! [`PlatformAdapter`] that hands out opaque [`HostNode`] handles.

use std::fmt;

use crate::error::AdapterError;
use crate::vnode::PropValue;

/// Opaque handle to a node owned by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(pub u64);

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Host operations.
pub trait PlatformAdapter {
    fn create_element(&mut self, tag: &str) -> AdapterResult<HostNode>;

    fn create_text(&mut self, text: &str) -> AdapterResult<HostNode>;

    fn create_comment(&mut self, text: &str) -> AdapterResult<HostNode>;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: HostNode, text: &str) -> AdapterResult<()>;

    /// Replace all children of an element with text.
    fn set_element_text(&mut self, node: HostNode, text: &str) -> AdapterResult<()>;

    /// Insert `node` into `parent` before `anchor` (append when `None`).
    /// An attached node is moved.
    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) -> AdapterResult<()>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: HostNode) -> AdapterResult<()>;

    /// Apply a prop change. `next == None` removes the prop.
    fn patch_prop(
        &mut self,
        node: HostNode,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> AdapterResult<()>;

    fn parent_node(&self, node: HostNode) -> Option<HostNode>;

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;
}
