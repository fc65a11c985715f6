//! Runtime configuration.
//!
//! One [`RuntimeConfig`] is active per thread. The scheduler reads the
//! recursion guard from it, the renderer reads the block-tree switch, and
//! error routing falls back to its handler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ErrorSource, RuntimeError};

/// Default bound on how many times one job may run within a single flush.
pub const DEFAULT_MAX_RECURSIVE_UPDATES: usize = 100;

/// Environment variable overriding [`RuntimeConfig::max_recursive_updates`].
pub const ENV_MAX_UPDATES: &str = "SPARK_VDOM_MAX_UPDATES";

/// Environment variable overriding [`RuntimeConfig::block_tree`] (`0`/`false` disables).
pub const ENV_BLOCK_TREE: &str = "SPARK_VDOM_BLOCK_TREE";

/// Application level error handler.
pub type ErrorHandler = Rc<dyn Fn(&RuntimeError, ErrorSource)>;

/// Tunables for the reactive pipeline.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Recursion guard for scheduler flushes.
    pub max_recursive_updates: usize,
    /// Honor blocks and patch flags while diffing. When off, every patch is a
    /// full comparison.
    pub block_tree: bool,
    /// Log a warning when an array of children falls back to positional diffing.
    pub warn_keyless_lists: bool,
    /// Receives errors no error-captured hook handled.
    pub error_handler: Option<ErrorHandler>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_recursive_updates: DEFAULT_MAX_RECURSIVE_UPDATES,
            block_tree: true,
            warn_keyless_lists: false,
            error_handler: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("max_recursive_updates", &self.max_recursive_updates)
            .field("block_tree", &self.block_tree)
            .field("warn_keyless_lists", &self.warn_keyless_lists)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl RuntimeConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(ENV_MAX_UPDATES) {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.max_recursive_updates = limit,
                _ => tracing::warn!(value = %raw, "ignoring invalid {ENV_MAX_UPDATES}"),
            }
        }
        if let Ok(raw) = std::env::var(ENV_BLOCK_TREE) {
            config.block_tree = !matches!(raw.trim(), "0" | "false" | "off");
        }
        config
    }

    pub fn with_max_recursive_updates(mut self, limit: usize) -> Self {
        self.max_recursive_updates = limit.max(1);
        self
    }

    pub fn with_block_tree(mut self, enabled: bool) -> Self {
        self.block_tree = enabled;
        self
    }

    pub fn with_warn_keyless_lists(mut self, enabled: bool) -> Self {
        self.warn_keyless_lists = enabled;
        self
    }

    pub fn with_error_handler(
        mut self,
        handler: impl Fn(&RuntimeError, ErrorSource) + 'static,
    ) -> Self {
        self.error_handler = Some(Rc::new(handler));
        self
    }
}

// =============================================================================
// Thread-local Config
// =============================================================================

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Replace the active configuration.
pub fn configure(config: RuntimeConfig) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// Snapshot of the active configuration.
pub fn config() -> RuntimeConfig {
    CONFIG.with(|c| c.borrow().clone())
}

/// Active recursion guard.
pub fn max_recursive_updates() -> usize {
    CONFIG.with(|c| c.borrow().max_recursive_updates)
}

/// Whether block-tree optimizations are enabled.
pub fn block_tree_enabled() -> bool {
    CONFIG.with(|c| c.borrow().block_tree)
}

pub fn warn_keyless_lists() -> bool {
    CONFIG.with(|c| c.borrow().warn_keyless_lists)
}

/// Restore defaults (for testing).
pub fn reset_config() {
    configure(RuntimeConfig::default());
}

/// Hand an error to the configured handler, or log it.
pub(crate) fn report_unhandled(error: &RuntimeError, source: ErrorSource) {
    let handler = CONFIG.with(|c| c.borrow().error_handler.clone());
    match handler {
        Some(handler) => handler(error, source),
        None => tracing::error!(%source, %error, "unhandled runtime error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_defaults() {
        reset_config();
        let cfg = config();
        assert_eq!(cfg.max_recursive_updates, DEFAULT_MAX_RECURSIVE_UPDATES);
        assert!(cfg.block_tree);
        assert!(cfg.error_handler.is_none());
    }

    #[test]
    fn test_builder_clamps_limit() {
        let cfg = RuntimeConfig::default().with_max_recursive_updates(0);
        assert_eq!(cfg.max_recursive_updates, 1);
    }

    #[test]
    fn test_configure_and_report() {
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        configure(RuntimeConfig::default().with_error_handler(move |_, source| {
            assert_eq!(source, ErrorSource::Render);
            hits_clone.set(hits_clone.get() + 1);
        }));

        report_unhandled(&RuntimeError::RendererBusy, ErrorSource::Render);
        assert_eq!(hits.get(), 1);

        reset_config();
        assert!(config().error_handler.is_none());
    }
}
