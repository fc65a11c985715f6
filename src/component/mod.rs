//! Components.
//!
//! A [`ComponentDef`] pairs a name with a setup function. Mounting a component
//! vnode creates a [`ComponentInstance`] that owns:
//!
//! - an effect scope holding every effect its setup created
//! - a render effect, scheduled through the job queue when its inputs change
//! - its props as a signal, so render functions track individual reads
//! - lifecycle hooks registered through [`SetupContext`]
//!
//! The renderer drives instances; this module holds the data.

pub mod context;
pub mod definition;
pub mod hooks;
pub mod instance;

pub use context::{current_rendering_instance, with_ctx, RenderContext, SetupContext};
pub use definition::{
    async_setup, define_component, functional_component, reject_setup, resolve_setup, AsyncSetup,
    AsyncState, Component, ComponentDef, RenderFn, RenderResult, SetupFn, SetupOutcome,
};
pub use hooks::{ErrorCapturedHook, Hook, HookKind, LifecycleHooks};
pub use instance::{ComponentInstance, InstanceId, InstanceTree, LifecycleState};
