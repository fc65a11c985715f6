//! Component mounting, updates and teardown.
//!
//! Each instance owns a lazy render effect. Running it calls the render
//! function under tracking and leaves the tree in the instance's output slot;
//! the renderer then patches that tree against the previous one. When a
//! tracked input changes, the effect's scheduler queues the instance's update
//! job (ordered by tree depth, so parents render before children).

use super::adapter::{HostNode, PlatformAdapter};
use super::RendererState;
use crate::component::context::enter_instance;
use crate::component::instance::{RenderOutput, RenderSource};
use crate::component::{
    AsyncState, ComponentInstance, HookKind, InstanceId, LifecycleState, SetupContext, SetupOutcome,
};
use crate::config;
use crate::error::{ErrorSource, Result, RuntimeError};
use crate::reactive::{effect, EffectOptions};
use crate::scheduler::{self, Job, JobId};
use crate::vnode::{comment, Children, PatchFlags, VNode, VNodeKind};

/// Whether a parent-driven patch must re-render the child.
///
/// Inside an optimized block only the flagged parts are compared. Otherwise
/// any non-stable slots force an update, and props are compared in full.
pub fn should_update_component(prev: &VNode, next: &VNode, optimized: bool) -> bool {
    let flag = next.patch_flag();
    if optimized && !flag.intersects(PatchFlags::HOISTED | PatchFlags::BAIL) {
        if flag.contains(PatchFlags::DYNAMIC_SLOTS) {
            return true;
        }
        if flag.contains(PatchFlags::FULL_PROPS) {
            return prev.props() != next.props();
        }
        if flag.contains(PatchFlags::PROPS) {
            return next.dynamic_props().iter().any(|key| prev.prop(key) != next.prop(key));
        }
        return false;
    }

    let had_slots = matches!(prev.children(), Children::Slots(s) if !s.is_empty());
    let has_slots = matches!(next.children(), Children::Slots(s) if !s.is_empty());
    if (had_slots || has_slots) && !(has_slots && next.slots().is_stable()) {
        return true;
    }
    prev.props() != next.props()
}

impl<A: PlatformAdapter + 'static> RendererState<A> {
    // =========================================================================
    // Creation
    // =========================================================================

    pub(crate) fn create_instance(&mut self, vnode: &VNode, parent: Option<InstanceId>) -> Result<InstanceId> {
        let VNodeKind::Component(def) = vnode.kind() else {
            return Err(RuntimeError::NotAComponent(format!("{:?}", vnode.kind())));
        };
        let depth = match parent {
            Some(p) => {
                let parent = self.instances.get(p).ok_or_else(|| RuntimeError::UnknownInstance(p.to_string()))?;
                parent.depth() + 1
            }
            None => 0,
        };
        let def = def.clone();
        let id = self
            .instances
            .allocate(|id| ComponentInstance::new(id, vnode, def, parent, depth));
        if let Some(p) = parent.and_then(|p| self.instances.get_mut(p)) {
            p.children.insert(id);
        }
        vnode.set_component(Some(id));
        tracing::debug!(instance = %id, depth, "instance created");
        Ok(id)
    }

    pub(crate) fn mount_component(
        &mut self,
        vnode: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
    ) -> Result<()> {
        let id = self.create_instance(vnode, parent)?;
        let name = self.instance_name(id);
        let _span = tracing::debug_span!("mount_component", component = %name, instance = %id).entered();

        self.setup_component(id);
        self.setup_render_effect(id);
        self.run_hooks(id, HookKind::BeforeMount);

        let (tree, live) = self.render_component_root(id).unwrap_or_else(|| (comment(""), false));
        let result = self.patch(None, &tree, container, anchor, Some(id), false);

        if let Some(inst) = self.instances.get_mut(id) {
            vnode.set_el(tree.el());
            inst.subtree = Some(tree);
            inst.advance(LifecycleState::Mounted)?;
            inst.mounted_hooks_queued = live;
        }
        if live {
            self.queue_hooks(id, HookKind::Mounted);
        }
        result
    }

    fn instance_name(&self, id: InstanceId) -> String {
        self.instances.get(id).map(|i| i.name().to_string()).unwrap_or_default()
    }

    fn setup_component(&mut self, id: InstanceId) {
        let Some(inst) = self.instances.get(id) else {
            return;
        };
        let setup = inst.def.setup();
        let scope = inst.scope;
        let ctx = SetupContext::new(inst.render_ctx.clone());

        let outcome = {
            let _rendering = enter_instance(Some(id));
            scope.run(|| setup(&ctx))
        };
        let hooks = ctx.into_hooks();
        let source = match outcome {
            Ok(SetupOutcome::Render(render)) => RenderSource::Ready(render),
            Ok(SetupOutcome::Async(state)) => RenderSource::Async(state),
            Err(err) => {
                let error = RuntimeError::Setup {
                    component: self.instance_name(id),
                    message: err.message,
                };
                self.handle_error(id, &error, ErrorSource::Setup);
                RenderSource::Failed
            }
        };
        if let Some(inst) = self.instances.get_mut(id) {
            inst.hooks = hooks;
            inst.source = source;
        }
    }

    fn setup_render_effect(&mut self, id: InstanceId) {
        let Some(inst) = self.instances.get(id) else {
            return;
        };
        let source = inst.source.clone();
        let ctx = inst.render_ctx.clone();
        let output = inst.output.clone();
        let scope = inst.scope;
        let job = self.update_job(id, inst.job_id, inst.depth(), inst.name());

        let render = move || {
            let produced = match &source {
                RenderSource::Ready(render) => RenderOutput {
                    result: render(&ctx),
                    source: ErrorSource::Render,
                    pending: false,
                },
                RenderSource::Async(state) => match state.get() {
                    AsyncState::Pending => RenderOutput {
                        result: Ok(comment("")),
                        source: ErrorSource::AsyncSetup,
                        pending: true,
                    },
                    AsyncState::Resolved(render) => RenderOutput {
                        result: render(&ctx),
                        source: ErrorSource::Render,
                        pending: false,
                    },
                    AsyncState::Rejected(err) => RenderOutput {
                        result: Err(err),
                        source: ErrorSource::AsyncSetup,
                        pending: true,
                    },
                },
                RenderSource::Failed => RenderOutput {
                    result: Ok(comment("")),
                    source: ErrorSource::Setup,
                    pending: true,
                },
            };
            *output.borrow_mut() = Some(produced);
        };

        let options = EffectOptions::default()
            .lazy()
            .with_scheduler(move |_| scheduler::queue_job(job.clone()));
        let render_effect = scope.run(|| effect(render, options));
        if let Some(inst) = self.instances.get_mut(id) {
            inst.render_effect = Some(render_effect);
        }
    }

    /// The job that re-renders `id` when its render effect is triggered.
    fn update_job(&self, id: InstanceId, job_id: JobId, depth: u32, label: &str) -> Job {
        let state = self.self_ref.clone();
        Job::new(job_id, depth, label, move || {
            let Some(state) = state.upgrade() else {
                return Ok(());
            };
            let mut state = state.try_borrow_mut().map_err(|_| RuntimeError::RendererBusy)?;
            state.run_scheduled_update(id)
        })
    }

    /// Run the render effect. Returns the tree and whether it came from a
    /// real render rather than a placeholder, or `None` on error.
    fn render_component_root(&mut self, id: InstanceId) -> Option<(VNode, bool)> {
        let (render_effect, output) = {
            let inst = self.instances.get(id)?;
            (inst.render_effect?, inst.output.clone())
        };
        {
            let _rendering = enter_instance(Some(id));
            render_effect.run();
        }
        let produced = output.borrow_mut().take()?;
        match produced.result {
            Ok(tree) => {
                if !produced.pending {
                    if let Some(inst) = self.instances.get_mut(id) {
                        inst.render_count += 1;
                    }
                }
                Some((tree, !produced.pending))
            }
            Err(err) => {
                let component = self.instance_name(id);
                let error = match produced.source {
                    ErrorSource::AsyncSetup => RuntimeError::Setup {
                        component,
                        message: err.message,
                    },
                    _ => RuntimeError::Render {
                        component,
                        message: err.message,
                    },
                };
                self.handle_error(id, &error, produced.source);
                None
            }
        }
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Parent-driven patch of a component vnode.
    pub(crate) fn update_component(&mut self, prev: &VNode, next: &VNode, optimized: bool) -> Result<()> {
        let Some(id) = prev.component() else {
            return Ok(());
        };
        next.set_component(Some(id));
        next.set_el(prev.el());
        if !self.instances.contains(id) {
            return Ok(());
        }

        if should_update_component(prev, next, optimized) {
            if let Some(inst) = self.instances.get_mut(id) {
                inst.next = Some(next.clone());
            }
            self.update_instance(id)
        } else {
            if let Some(inst) = self.instances.get_mut(id) {
                inst.vnode = next.clone();
            }
            Ok(())
        }
    }

    /// Re-render a mounted instance and patch its subtree.
    fn update_instance(&mut self, id: InstanceId) -> Result<()> {
        let Some(inst) = self.instances.get_mut(id) else {
            return Ok(());
        };
        if inst.state != LifecycleState::Mounted {
            return Ok(());
        }
        let _span = tracing::debug_span!("update_component", component = %inst.name(), instance = %id).entered();

        if let Some(next) = inst.next.take() {
            next.set_component(Some(id));
            *inst.slots.borrow_mut() = next.slots();
            inst.props.set(next.props().clone());
            inst.vnode = next;
            // This update covers whatever the props write just queued.
            scheduler::invalidate_job(inst.job_id);
        }

        self.run_hooks(id, HookKind::BeforeUpdate);
        let Some((tree, live)) = self.render_component_root(id) else {
            return Ok(());
        };

        let previous = self.instances.get_mut(id).and_then(|i| i.subtree.take());
        let container = previous
            .as_ref()
            .and_then(|prev| self.first_host_node(prev))
            .and_then(|node| self.adapter.parent_node(node));
        let Some(container) = container else {
            // Detached from the host tree; nothing to patch into.
            if let Some(inst) = self.instances.get_mut(id) {
                inst.subtree = previous;
            }
            return Ok(());
        };
        let anchor = previous.as_ref().and_then(|prev| self.next_host_node(prev));
        let result = self.patch(previous.as_ref(), &tree, container, anchor, Some(id), false);

        let mut hook = None;
        if let Some(inst) = self.instances.get_mut(id) {
            inst.vnode.set_el(tree.el());
            inst.subtree = Some(tree);
            if inst.mounted_hooks_queued {
                hook = Some(HookKind::Updated);
            } else if live {
                inst.mounted_hooks_queued = true;
                hook = Some(HookKind::Mounted);
            }
        }
        if let Some(kind) = hook {
            self.queue_hooks(id, kind);
        }
        result
    }

    /// Entry point of an instance's queued job.
    pub(crate) fn run_scheduled_update(&mut self, id: InstanceId) -> Result<()> {
        self.begin();
        let dirty = self.instances.get(id).is_some_and(|inst| {
            inst.state == LifecycleState::Mounted && inst.render_effect.is_some_and(|e| e.is_dirty())
        });
        if !dirty {
            return Ok(());
        }
        self.update_instance(id)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    pub(crate) fn unmount_component(&mut self, id: InstanceId, do_remove: bool) -> Result<()> {
        let Some(inst) = self.instances.get_mut(id) else {
            return Ok(());
        };
        if inst.state >= LifecycleState::Unmounting {
            return Ok(());
        }
        inst.advance(LifecycleState::Unmounting)?;
        scheduler::invalidate_job(inst.job_id);
        let _span = tracing::debug_span!("unmount_component", component = %inst.name(), instance = %id).entered();

        self.run_hooks(id, HookKind::BeforeUnmount);

        let subtree = self.instances.get_mut(id).and_then(|i| i.subtree.take());
        let result = match subtree {
            Some(tree) => self.unmount(&tree, Some(id), do_remove),
            None => Ok(()),
        };

        let Some(inst) = self.instances.get_mut(id) else {
            return result;
        };
        inst.render_effect = None;
        let scope = inst.scope;
        let parent = inst.parent;
        scope.stop();
        self.queue_hooks(id, HookKind::Unmounted);

        if let Some(inst) = self.instances.get_mut(id) {
            inst.advance(LifecycleState::Unmounted)?;
        }
        if let Some(p) = parent.and_then(|p| self.instances.get_mut(p)) {
            p.children.shift_remove(&id);
        }
        let released = self.instances.release(id);
        drop(released);
        tracing::debug!(instance = %id, "instance released");
        result
    }

    // =========================================================================
    // Hooks & Errors
    // =========================================================================

    fn run_hooks(&self, id: InstanceId, kind: HookKind) {
        let hooks = self
            .instances
            .get(id)
            .map(|inst| inst.hooks.get(kind).to_vec())
            .unwrap_or_default();
        for hook in hooks {
            hook();
        }
    }

    /// Queue `kind` hooks of `id` as post-flush callbacks.
    fn queue_hooks(&self, id: InstanceId, kind: HookKind) {
        let Some(inst) = self.instances.get(id) else {
            return;
        };
        for hook in inst.hooks.get(kind) {
            let hook = hook.clone();
            scheduler::queue_post_flush_cb(Job::new(JobId::next(), 0, kind.label(), move || {
                hook();
                Ok(())
            }));
        }
    }

    /// Offer `error` to each ancestor's error-captured hooks, nearest first.
    /// A hook returning `false` stops it; otherwise it reaches the configured
    /// handler.
    pub(crate) fn handle_error(&self, id: InstanceId, error: &RuntimeError, source: ErrorSource) {
        tracing::debug!(instance = %id, %source, %error, "component error");
        for ancestor in self.instances.ancestors(id) {
            let hooks = self
                .instances
                .get(ancestor)
                .map(|inst| inst.hooks.error_captured().to_vec())
                .unwrap_or_default();
            for hook in hooks {
                if !hook(error, source) {
                    return;
                }
            }
        }
        config::report_unhandled(error, source);
    }
}
