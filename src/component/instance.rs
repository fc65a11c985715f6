//! Component instances and the instance arena.
//!
//! Instances live in an [`InstanceTree`] owned by the renderer. Ids are
//! generational indices: a released slot goes to a free pool for O(1) reuse
//! and its generation is bumped, so stale ids resolve to nothing.
//!
//! Parent links are plain ids. The tree never holds a strong reference
//! upward.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use super::context::RenderContext;
use super::definition::{AsyncSetup, Component, RenderFn, RenderResult};
use super::hooks::LifecycleHooks;
use crate::error::{ErrorSource, Result, RuntimeError};
use crate::reactive::{detached_scope, signal, Effect, EffectScope, Signal};
use crate::scheduler::JobId;
use crate::vnode::{Props, Slots, VNode};

/// Generational instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}v{}", self.index, self.generation)
    }
}

/// Instance lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Created,
    Mounted,
    Unmounting,
    Unmounted,
}

/// Where an instance gets its tree from.
#[derive(Clone)]
pub(crate) enum RenderSource {
    Ready(RenderFn),
    Async(AsyncSetup),
    /// Setup failed.
    Failed,
}

/// What the render effect left for the renderer.
pub(crate) struct RenderOutput {
    pub result: RenderResult,
    pub source: ErrorSource,
    pub pending: bool,
}

pub(crate) type OutputSlot = Rc<RefCell<Option<RenderOutput>>>;

pub struct ComponentInstance {
    pub(crate) id: InstanceId,
    pub(crate) def: Component,
    /// The vnode currently representing this instance in its parent's tree.
    pub(crate) vnode: VNode,
    /// Replacement vnode from a parent-driven update.
    pub(crate) next: Option<VNode>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) children: IndexSet<InstanceId>,
    pub(crate) depth: u32,
    pub(crate) props: Signal<Props>,
    pub(crate) slots: Rc<RefCell<Slots>>,
    pub(crate) render_ctx: RenderContext,
    pub(crate) scope: EffectScope,
    pub(crate) source: RenderSource,
    pub(crate) render_effect: Option<Effect>,
    pub(crate) output: OutputSlot,
    pub(crate) subtree: Option<VNode>,
    pub(crate) hooks: LifecycleHooks,
    pub(crate) state: LifecycleState,
    pub(crate) job_id: JobId,
    pub(crate) mounted_hooks_queued: bool,
    pub(crate) render_count: usize,
}

impl ComponentInstance {
    pub(crate) fn new(id: InstanceId, vnode: &VNode, def: Component, parent: Option<InstanceId>, depth: u32) -> Self {
        let props = signal(vnode.props().clone());
        let slots = Rc::new(RefCell::new(vnode.slots()));
        let render_ctx = RenderContext::new(id, props.clone(), slots.clone());
        Self {
            id,
            def,
            vnode: vnode.clone(),
            next: None,
            parent,
            children: IndexSet::new(),
            depth,
            props,
            slots,
            render_ctx,
            // Instance scopes are owned by the instance tree, not by whatever
            // scope happens to be running at mount time.
            scope: detached_scope(),
            source: RenderSource::Failed,
            render_effect: None,
            output: Rc::new(RefCell::new(None)),
            subtree: None,
            hooks: LifecycleHooks::default(),
            state: LifecycleState::Created,
            job_id: JobId::next(),
            mounted_hooks_queued: false,
            render_count: 0,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn subtree(&self) -> Option<&VNode> {
        self.subtree.as_ref()
    }

    /// Times the render function produced a tree.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn scope(&self) -> EffectScope {
        self.scope
    }

    /// Move to `to`. Moving backwards (or staying) is an error.
    pub(crate) fn advance(&mut self, to: LifecycleState) -> Result<()> {
        if to <= self.state {
            return Err(RuntimeError::InvalidTransition { from: self.state, to });
        }
        tracing::trace!(instance = %self.id, from = ?self.state, ?to, "lifecycle");
        self.state = to;
        Ok(())
    }
}

// =============================================================================
// Instance Tree
// =============================================================================

struct Entry {
    generation: u32,
    instance: Option<ComponentInstance>,
}

/// Arena of live instances.
#[derive(Default)]
pub struct InstanceTree {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl InstanceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot, reusing a freed one when available.
    pub(crate) fn allocate(&mut self, build: impl FnOnce(InstanceId) -> ComponentInstance) -> InstanceId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    instance: None,
                });
                u32::try_from(self.entries.len() - 1).unwrap_or(u32::MAX)
            }
        };
        let entry = &mut self.entries[index as usize];
        let id = InstanceId {
            index,
            generation: entry.generation,
        };
        entry.instance = Some(build(id));
        self.live += 1;
        id
    }

    /// Free the slot for reuse. Stale ids stop resolving.
    pub(crate) fn release(&mut self, id: InstanceId) -> Option<ComponentInstance> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let instance = entry.instance.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(instance)
    }

    pub fn get(&self, id: InstanceId) -> Option<&ComponentInstance> {
        let entry = self.entries.get(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.instance.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut ComponentInstance> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.instance.as_mut()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|i| i.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.get(parent).and_then(|i| i.parent);
        }
        out
    }
}
