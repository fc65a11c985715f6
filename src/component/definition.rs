//! Component definitions.
//!
//! A component is a named setup function. Setup runs once per instance and
//! returns the render function, or a pending [`AsyncSetup`] that resolves to
//! one later.
//!
//! ```ignore
//! let counter = define_component("Counter", |ctx| {
//!     let count = signal(0);
//!     ctx.on_mounted(|| tracing::info!("counter mounted"));
//!     Ok(SetupOutcome::render(move |_| {
//!         Ok(h("span", Props::new(), count.get().to_string()))
//!     }))
//! });
//! ```

use std::fmt;
use std::rc::Rc;

use super::context::{RenderContext, SetupContext};
use crate::error::ComponentError;
use crate::reactive::{signal_with_equals, Signal};
use crate::vnode::VNode;

/// Result of a render function.
pub type RenderResult = std::result::Result<VNode, ComponentError>;

/// Render function produced by setup.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> RenderResult>;

pub type SetupFn = Rc<dyn Fn(&SetupContext) -> std::result::Result<SetupOutcome, ComponentError>>;

/// State of an asynchronous operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncState<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> AsyncState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncState::Pending)
    }
}

/// Pending setup. Resolve it with the render function once it is ready.
pub type AsyncSetup = Signal<AsyncState<RenderFn, ComponentError>>;

/// Create an unresolved [`AsyncSetup`].
pub fn async_setup() -> AsyncSetup {
    signal_with_equals(AsyncState::Pending, |a, b| a.is_pending() && b.is_pending())
}

/// Resolve a pending setup with a render function.
pub fn resolve_setup(setup: &AsyncSetup, render: impl Fn(&RenderContext) -> RenderResult + 'static) {
    setup.set(AsyncState::Resolved(Rc::new(render)));
}

/// Reject a pending setup.
pub fn reject_setup(setup: &AsyncSetup, error: impl Into<ComponentError>) {
    setup.set(AsyncState::Rejected(error.into()));
}

/// What setup returns.
#[derive(Clone)]
pub enum SetupOutcome {
    Render(RenderFn),
    Async(AsyncSetup),
}

impl SetupOutcome {
    pub fn render(f: impl Fn(&RenderContext) -> RenderResult + 'static) -> Self {
        SetupOutcome::Render(Rc::new(f))
    }
}

impl fmt::Debug for SetupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupOutcome::Render(_) => f.write_str("Render(..)"),
            SetupOutcome::Async(state) => {
                let pending = state.with_untracked(AsyncState::is_pending);
                write!(f, "Async(pending: {pending})")
            }
        }
    }
}

/// A component definition. Identity (pointer equality) decides whether two
/// component vnodes are the same type.
pub struct ComponentDef {
    name: String,
    setup: SetupFn,
}

pub type Component = Rc<ComponentDef>;

impl ComponentDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn setup(&self) -> SetupFn {
        self.setup.clone()
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef").field("name", &self.name).finish()
    }
}

/// Define a component from a setup function.
pub fn define_component(
    name: impl Into<String>,
    setup: impl Fn(&SetupContext) -> std::result::Result<SetupOutcome, ComponentError> + 'static,
) -> Component {
    Rc::new(ComponentDef {
        name: name.into(),
        setup: Rc::new(setup),
    })
}

/// Define a component that only renders.
pub fn functional_component(
    name: impl Into<String>,
    render: impl Fn(&RenderContext) -> RenderResult + 'static,
) -> Component {
    let render: RenderFn = Rc::new(render);
    define_component(name, move |_| Ok(SetupOutcome::Render(render.clone())))
}
