//! Error types for the runtime.
//!
//! Three families of failure flow through the pipeline:
//!
//! - **Usage errors** - duplicate keys in keyed children, runaway update loops.
//!   Surfaced immediately with the offending key or job.
//! - **Render errors** - a component's setup or render function returned an
//!   error. Caught at the instance boundary and routed to error handlers.
//! - **Adapter errors** - the platform adapter refused an operation. These
//!   abort the current patch and propagate to the caller.

use std::fmt;

use thiserror::Error;

use crate::component::LifecycleState;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Error raised by a [`PlatformAdapter`](crate::renderer::PlatformAdapter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("adapter operation `{op}` failed: {message}")]
pub struct AdapterError {
    /// Adapter operation that failed (`insert`, `remove`, ...).
    pub op: &'static str,
    /// Adapter supplied description.
    pub message: String,
}

impl AdapterError {
    pub fn new(op: &'static str, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

/// Error returned by user supplied setup and render functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComponentError {
    pub message: String,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Where a reported error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// Component setup function.
    Setup,
    /// Component render function.
    Render,
    /// Asynchronous setup rejected.
    AsyncSetup,
    /// A scheduled job.
    Scheduler,
    /// A lifecycle hook.
    Hook,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorSource::Setup => "setup",
            ErrorSource::Render => "render",
            ErrorSource::AsyncSetup => "async setup",
            ErrorSource::Scheduler => "scheduler",
            ErrorSource::Hook => "hook",
        };
        f.write_str(name)
    }
}

/// Crate error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Two siblings in one keyed children array share a key.
    #[error("duplicate key `{key}` in keyed children")]
    DuplicateKey { key: String },

    /// A job re-queued itself more often than the recursion guard allows.
    #[error("maximum recursive updates exceeded ({limit}) in job `{job}`")]
    MaxUpdateDepth { job: String, limit: usize },

    /// Setup of `component` failed.
    #[error("setup of component `{component}` failed: {message}")]
    Setup { component: String, message: String },

    /// Render of `component` failed.
    #[error("render of component `{component}` failed: {message}")]
    Render { component: String, message: String },

    /// Platform adapter failure.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Lifecycle state machine moved backwards.
    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// The renderer was entered while it was already patching.
    #[error("renderer is busy: re-entrant render call")]
    RendererBusy,

    /// A component operation was given a non-component vnode.
    #[error("vnode `{0}` is not a component")]
    NotAComponent(String),

    /// An instance id did not resolve to a live instance.
    #[error("unknown component instance {0}")]
    UnknownInstance(String),
}

impl RuntimeError {
    /// True for the usage-error family.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            RuntimeError::DuplicateKey { .. } | RuntimeError::MaxUpdateDepth { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::DuplicateKey { key: "a".into() };
        assert_eq!(err.to_string(), "duplicate key `a` in keyed children");
        assert!(err.is_usage_error());

        let err: RuntimeError = AdapterError::new("insert", "detached parent").into();
        assert_eq!(
            err.to_string(),
            "adapter operation `insert` failed: detached parent"
        );
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_component_error_from_str() {
        let err: ComponentError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
