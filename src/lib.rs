//! # spark-vdom
//!
//! Reactive virtual-node renderer for Rust.
//!
//! ## Architecture
//!
//! State lives in fine-grained [`reactive`] cells. Component render functions
//! run inside effects, so a write schedules exactly the components that read
//! the cell. Scheduled work is batched by the [`scheduler`] and flushed in
//! parent-before-child order.
//!
//! ```text
//! Signal::set → render effect dirty → queue_job(depth) → flush_jobs
//!     → render() → VNode tree → patch(old, new) → PlatformAdapter ops
//! ```
//!
//! The patcher is block-aware: nodes built inside [`vnode::block`] record
//! their dynamic descendants, and an update only visits those, guided by
//! [`PatchFlags`]. Children arrays are reconciled by key with a
//! longest-increasing-subsequence pass so reorders issue the fewest moves.
//!
//! ## Modules
//!
//! - [`reactive`] - signals, effects, derived values, effect scopes
//! - [`scheduler`] - job queue, post-flush callbacks, recursion guard
//! - [`vnode`] - vnodes, props, patch flags, blocks, class/style normalization
//! - [`component`] - component definitions, instances, lifecycle hooks
//! - [`renderer`] - patching, keyed diffing, platform adapter, in-memory host
//! - [`config`] - per-thread runtime configuration
//! - [`error`] - error types
//! - [`logging`] - optional tracing subscriber setup

pub mod component;
pub mod config;
pub mod error;
pub mod logging;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod vnode;

pub use error::{AdapterError, ComponentError, ErrorSource, Result, RuntimeError};

pub use config::{configure, reset_config, RuntimeConfig};

pub use reactive::{
    derived, effect, effect_scope, on_scope_dispose, signal, untrack, Derived, Effect, EffectOptions,
    EffectScope, Flush, Signal,
};

pub use scheduler::{flush_jobs, next_tick, queue_job, queue_post_flush_cb, FlushSummary, Job, JobId};

pub use vnode::{
    block, comment, component as component_vnode, element, fragment, h, h_component, props, text,
    Children, Key, PatchFlags, PropValue, Props, ShapeFlags, Slots, VNode,
};

pub use component::{
    define_component, functional_component, with_ctx, AsyncState, Component, InstanceId,
    LifecycleState, RenderContext, SetupContext, SetupOutcome,
};

pub use renderer::{HostNode, MemoryAdapter, PlatformAdapter, Renderer};
