//! Reactive graph.
//!
//! Fine-grained reactivity built from three pieces:
//!
//! - [`Signal`] - a mutable cell. Reads are tracked, writes notify.
//! - [`Effect`] - a computation that re-runs (or is scheduled) when a cell it
//!   read changes.
//! - [`Derived`] - a cached value computed from other cells.
//!
//! Effects are owned by [`EffectScope`]s; component instances use one scope
//! each so unmounting stops everything the instance created.

mod derived;
mod effect;
pub(crate) mod runtime;
mod scope;
mod signal;

pub use derived::{derived, Derived};
pub use effect::{effect, Effect, EffectOptions, EffectScheduler, Flush};
pub use runtime::{current_effect, observer_depth, untrack, CellId, EffectId, ScopeId};
pub use scope::{detached_scope, effect_scope, on_scope_dispose, EffectScope};
pub use signal::{reactive, signal, signal_always, signal_with_equals, Signal};
