//! Setup and render contexts, and the current rendering instance.

use std::cell::RefCell;
use std::rc::Rc;

use super::hooks::{ErrorCapturedHook, Hook, HookKind, LifecycleHooks};
use super::instance::InstanceId;
use crate::error::{ErrorSource, RuntimeError};
use crate::reactive::Signal;
use crate::vnode::{open_block, PropValue, Props, Slot, Slots, VNode};

// =============================================================================
// Current Rendering Instance
// =============================================================================

thread_local! {
    static RENDERING: RefCell<Vec<Option<InstanceId>>> = const { RefCell::new(Vec::new()) };
}

/// The instance whose setup, render function or slot is executing.
pub fn current_rendering_instance() -> Option<InstanceId> {
    RENDERING.with(|stack| stack.borrow().last().copied().flatten())
}

/// Restores the previous rendering instance when dropped.
#[must_use]
pub(crate) struct RenderingGuard {
    depth: usize,
}

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        let depth = self.depth;
        let _ = RENDERING.try_with(|stack| {
            if let Ok(mut stack) = stack.try_borrow_mut() {
                stack.truncate(depth);
            }
        });
    }
}

pub(crate) fn enter_instance(id: Option<InstanceId>) -> RenderingGuard {
    let depth = RENDERING.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(id);
        stack.len() - 1
    });
    RenderingGuard { depth }
}

/// Bind a slot function to the instance rendering now.
///
/// When the slot runs later (inside the child's render) it renders as its
/// owner, in a block that records nothing, so slot content never lands in
/// the child's block.
pub fn with_ctx(slot: impl Fn(&Props) -> Vec<VNode> + 'static) -> Slot {
    let owner = current_rendering_instance();
    Rc::new(move |props: &Props| {
        let _block = open_block(true);
        let _owner = enter_instance(owner);
        slot(props)
    })
}

// =============================================================================
// Contexts
// =============================================================================

/// What a render function sees.
#[derive(Clone)]
pub struct RenderContext {
    instance: InstanceId,
    props: Signal<Props>,
    slots: Rc<RefCell<Slots>>,
}

impl RenderContext {
    pub(crate) fn new(instance: InstanceId, props: Signal<Props>, slots: Rc<RefCell<Slots>>) -> Self {
        Self {
            instance,
            props,
            slots,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// All props, tracked.
    pub fn props(&self) -> Props {
        self.props.get()
    }

    /// One prop, tracked.
    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.props.with(|p| p.get(name).cloned())
    }

    pub fn slots(&self) -> Slots {
        self.slots.borrow().clone()
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.borrow().get(name).is_some()
    }

    /// Render a named slot, or nothing when absent.
    pub fn render_slot(&self, name: &str, props: &Props) -> Vec<VNode> {
        let slot = self.slots.borrow().get(name).cloned();
        slot.map(|slot| slot(props)).unwrap_or_default()
    }
}

/// What setup sees. Hooks registered here belong to the instance.
pub struct SetupContext {
    render: RenderContext,
    hooks: RefCell<LifecycleHooks>,
}

impl SetupContext {
    pub(crate) fn new(render: RenderContext) -> Self {
        Self {
            render,
            hooks: RefCell::new(LifecycleHooks::default()),
        }
    }

    pub(crate) fn into_hooks(self) -> LifecycleHooks {
        self.hooks.into_inner()
    }

    pub fn instance_id(&self) -> InstanceId {
        self.render.instance
    }

    pub fn props(&self) -> Props {
        self.render.props()
    }

    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.render.prop(name)
    }

    /// The props cell, for building derived state.
    pub fn props_signal(&self) -> Signal<Props> {
        self.render.props.clone()
    }

    pub fn slots(&self) -> Slots {
        self.render.slots()
    }

    fn register(&self, kind: HookKind, hook: impl Fn() + 'static) {
        let hook: Hook = Rc::new(hook);
        self.hooks.borrow_mut().register(kind, hook);
    }

    pub fn on_before_mount(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::BeforeMount, hook);
    }

    pub fn on_mounted(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::Mounted, hook);
    }

    pub fn on_before_update(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::BeforeUpdate, hook);
    }

    pub fn on_updated(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::Updated, hook);
    }

    pub fn on_before_unmount(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::BeforeUnmount, hook);
    }

    pub fn on_unmounted(&self, hook: impl Fn() + 'static) {
        self.register(HookKind::Unmounted, hook);
    }

    /// Observe errors raised by descendants. Return `false` to stop propagation.
    pub fn on_error_captured(&self, hook: impl Fn(&RuntimeError, ErrorSource) -> bool + 'static) {
        let hook: ErrorCapturedHook = Rc::new(hook);
        self.hooks.borrow_mut().register_error_captured(hook);
    }
}
