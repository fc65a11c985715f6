//! Blocks - flat lists of dynamic descendants.
//!
//! While a block is open, every vnode created with a dynamic patch flag (and
//! every component vnode) is appended to it. Closing the block hands the list
//! to the block root, so later patches visit only those nodes and skip the
//! static structure in between.
//!
//! ```ignore
//! let view = block(|| {
//!     element("div")
//!         .child(h("h1", Props::new(), "static title"))
//!         .child(element("p").children(label.get()).patch_flag(PatchFlags::TEXT).build())
//! });
//! assert_eq!(view.dynamic_children().map(|d| d.len()), Some(1));
//! ```
//!
//! Opening with `disable_tracking` pushes a block that records nothing; slot
//! content uses this so its nodes never leak into the caller's block.

use std::cell::RefCell;
use std::collections::HashSet;

use super::node::{VNode, VNodeBuilder};

thread_local! {
    /// Open blocks, innermost last. `None` frames record nothing.
    static BLOCK_STACK: RefCell<Vec<Option<Vec<VNode>>>> = const { RefCell::new(Vec::new()) };
}

/// An open block. Dropping it without [`finish`](Self::finish) pops it.
#[must_use = "an open block must be finished or dropped"]
pub struct BlockGuard {
    depth: usize,
    closed: bool,
}

/// Open a block.
pub fn open_block(disable_tracking: bool) -> BlockGuard {
    let depth = BLOCK_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(if disable_tracking { None } else { Some(Vec::new()) });
        stack.len() - 1
    });
    BlockGuard {
        depth,
        closed: false,
    }
}

impl BlockGuard {
    /// Pop this block (and anything left open above it), returning what it collected.
    pub fn close(mut self) -> Vec<VNode> {
        self.closed = true;
        pop_to(self.depth)
    }

    /// Close the block and build its root with the collected dynamic children.
    pub fn finish(self, root: VNodeBuilder) -> VNode {
        let dynamic = self.close();
        VNode::assemble(root, Some(dynamic))
    }
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        if !self.closed {
            let _ = BLOCK_STACK.try_with(|stack| {
                if let Ok(mut stack) = stack.try_borrow_mut() {
                    stack.truncate(self.depth);
                }
            });
        }
    }
}

fn pop_to(depth: usize) -> Vec<VNode> {
    BLOCK_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.len() <= depth {
            return Vec::new();
        }
        stack.truncate(depth + 1);
        stack.pop().flatten().unwrap_or_default()
    })
}

/// Build `root` as a block from a guard opened earlier.
pub fn create_block(guard: BlockGuard, root: VNodeBuilder) -> VNode {
    guard.finish(root)
}

/// Open a block, build the root inside it and close it.
pub fn block(build: impl FnOnce() -> VNodeBuilder) -> VNode {
    let guard = open_block(false);
    let root = build();
    guard.finish(root)
}

/// Record `vnode` in the innermost block, if it is tracking.
pub(crate) fn track_vnode(vnode: &VNode) {
    BLOCK_STACK.with(|stack| {
        if let Some(Some(list)) = stack.borrow_mut().last_mut() {
            list.push(vnode.clone());
        }
    })
}

/// Drop `roots` and every descendant of theirs from the innermost block.
///
/// Plain children handed to a component are built before the component node
/// and register in the caller's block; once they become slot content the
/// child instance owns them.
pub(crate) fn untrack_subtree(roots: &[VNode]) {
    if !is_tracking() {
        return;
    }
    let mut owned = HashSet::new();
    let mut pending: Vec<&VNode> = roots.iter().collect();
    while let Some(node) = pending.pop() {
        owned.insert(node.as_ptr());
        pending.extend(node.children().nodes());
    }
    BLOCK_STACK.with(|stack| {
        if let Some(Some(list)) = stack.borrow_mut().last_mut() {
            list.retain(|tracked| !owned.contains(&tracked.as_ptr()));
        }
    })
}

/// Number of open blocks.
pub fn block_depth() -> usize {
    BLOCK_STACK.with(|stack| stack.borrow().len())
}

/// Whether new dynamic vnodes are currently being recorded.
pub fn is_tracking() -> bool {
    BLOCK_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
}
