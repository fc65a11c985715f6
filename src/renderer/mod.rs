//! Renderer - turns vnode trees into host operations.
//!
//! # Pipeline
//!
//! ```text
//! render(vnode, container)
//!   └─ patch(old, new)          same Rc → skip, different type → replace
//!        ├─ text / comment      content update in place
//!        ├─ element             block children or full children, flagged props
//!        ├─ fragment            children between two empty-text anchors
//!        └─ component           mount instance / gate and update instance
//! ```
//!
//! Children arrays are reconciled by key with a longest-increasing-subsequence
//! pass ([`keyed`]), so a reorder issues the fewest moves.
//!
//! The renderer is single threaded and not re-entrant: a call made while a
//! patch is running fails with [`RuntimeError::RendererBusy`].

pub mod adapter;
mod component;
pub mod keyed;
pub mod memory;
mod patch;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

pub use adapter::{AdapterResult, HostNode, PlatformAdapter};
pub use component::should_update_component;
pub use keyed::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryAdapter, MemoryNode, MemoryNodeKind};

use crate::component::{InstanceId, InstanceTree, LifecycleState};
use crate::config;
use crate::error::{Result, RuntimeError};
use crate::scheduler;
use crate::vnode::VNode;

pub(crate) struct RendererState<A: PlatformAdapter + 'static> {
    pub(crate) adapter: A,
    pub(crate) instances: InstanceTree,
    /// Mounted root per container.
    roots: HashMap<HostNode, VNode>,
    /// Block-tree switch, sampled from the config at each entry point.
    pub(crate) block_tree: bool,
    pub(crate) self_ref: Weak<RefCell<RendererState<A>>>,
}

impl<A: PlatformAdapter + 'static> RendererState<A> {
    fn begin(&mut self) {
        self.block_tree = config::block_tree_enabled();
    }

    fn render_root(&mut self, vnode: Option<VNode>, container: HostNode) -> Result<()> {
        self.begin();
        let _span = tracing::debug_span!("render", %container).entered();
        let previous = self.roots.remove(&container);
        match (previous, vnode) {
            (None, None) => Ok(()),
            (Some(previous), None) => self.unmount(&previous, None, true),
            (previous, Some(next)) => {
                let result = self.patch(previous.as_ref(), &next, container, None, None, false);
                self.roots.insert(container, next);
                result
            }
        }
    }
}

/// Rendering entry point, generic over the host.
pub struct Renderer<A: PlatformAdapter + 'static> {
    state: Rc<RefCell<RendererState<A>>>,
}

impl<A: PlatformAdapter + 'static> Clone for Renderer<A> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<A: PlatformAdapter + 'static> Renderer<A> {
    pub fn new(adapter: A) -> Self {
        let state = Rc::new_cyclic(|weak| {
            RefCell::new(RendererState {
                adapter,
                instances: InstanceTree::new(),
                roots: HashMap::new(),
                block_tree: config::block_tree_enabled(),
                self_ref: weak.clone(),
            })
        });
        Self { state }
    }

    fn enter(&self) -> Result<std::cell::RefMut<'_, RendererState<A>>> {
        self.state.try_borrow_mut().map_err(|_| RuntimeError::RendererBusy)
    }

    /// Render `vnode` into `container`, replacing what was rendered there.
    /// `None` unmounts. Post-flush callbacks (mounted hooks) run before return.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) -> Result<()> {
        let result = self.enter()?.render_root(vnode, container);
        scheduler::flush_post_flush_cbs();
        result
    }

    /// Patch `old` into `new` directly. `old == None` mounts.
    pub fn patch(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        let result = {
            let mut state = self.enter()?;
            state.begin();
            state.patch(old, new, container, anchor, None, false)
        };
        scheduler::flush_post_flush_cbs();
        result
    }

    /// Unmount `vnode` and remove its host nodes.
    pub fn unmount(&self, vnode: &VNode) -> Result<()> {
        let result = self.enter()?.unmount(vnode, None, true);
        scheduler::flush_post_flush_cbs();
        result
    }

    /// Create an instance for a component vnode without mounting it.
    pub fn create_component_instance(&self, vnode: &VNode, parent: Option<InstanceId>) -> Result<InstanceId> {
        self.enter()?.create_instance(vnode, parent)
    }

    /// Currently mounted root of `container`.
    pub fn root(&self, container: HostNode) -> Option<VNode> {
        self.state.borrow().roots.get(&container).cloned()
    }

    pub fn with_adapter<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&self.state.borrow().adapter)
    }

    pub fn with_adapter_mut<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.state.borrow_mut().adapter)
    }

    pub fn instance_count(&self) -> usize {
        self.state.borrow().instances.len()
    }

    pub fn instance_state(&self, id: InstanceId) -> Option<LifecycleState> {
        self.state.borrow().instances.get(id).map(|i| i.state())
    }

    pub fn render_count(&self, id: InstanceId) -> Option<usize> {
        self.state.borrow().instances.get(id).map(|i| i.render_count())
    }

    pub fn instance_parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.state.borrow().instances.get(id).and_then(|i| i.parent())
    }

    pub fn instance_children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.state
            .borrow()
            .instances
            .get(id)
            .map(|i| i.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Instance rendering the component vnode at `root` of `container`.
    pub fn root_instance(&self, container: HostNode) -> Option<InstanceId> {
        self.state.borrow().roots.get(&container).and_then(VNode::component)
    }
}
