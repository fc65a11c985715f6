//! Effect scopes - ownership of effects and cleanups.
//!
//! Every effect created while a scope is running belongs to it. Stopping the
//! scope stops nested scopes first, then its effects in creation order, then
//! runs its dispose callbacks.
//!
//! ```ignore
//! let scope = effect_scope();
//! scope.run(|| {
//!     effect(move || { /* ... */ }, EffectOptions::default());
//!     on_scope_dispose(|| println!("disposed"));
//! });
//! scope.stop();
//! ```

use super::runtime::{self, ScopeId};

/// Handle to an effect scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectScope {
    id: ScopeId,
}

/// Create a scope nested in the running scope, if any.
pub fn effect_scope() -> EffectScope {
    EffectScope {
        id: runtime::create_scope(false),
    }
}

/// Create a scope not owned by the running scope.
pub fn detached_scope() -> EffectScope {
    EffectScope {
        id: runtime::create_scope(true),
    }
}

impl EffectScope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Run `f` with this scope as the owner of new effects.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        runtime::run_in_scope(self.id, f)
    }

    /// Stop every owned effect and run dispose callbacks. Idempotent.
    pub fn stop(&self) {
        runtime::stop_scope(self.id);
    }

    pub fn is_active(&self) -> bool {
        runtime::scope_is_active(self.id)
    }
}

/// Register a callback on the running scope.
///
/// Returns `false` (and drops the callback) outside any scope.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) -> bool {
    match runtime::register_scope_cleanup(Box::new(f)) {
        None => true,
        Some(_) => {
            tracing::warn!("on_scope_dispose called outside an active effect scope");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, signal, EffectOptions};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_scope_stops_effects() {
        let a = signal(0);
        let runs = Rc::new(RefCell::new(0));
        let scope = effect_scope();
        let e = scope.run(|| {
            let a = a.clone();
            let runs = runs.clone();
            effect(
                move || {
                    a.get();
                    *runs.borrow_mut() += 1;
                },
                EffectOptions::default(),
            )
        });
        scope.stop();
        assert!(!e.is_active());
        assert!(!scope.is_active());
        a.set(1);
        assert_eq!(*runs.borrow(), 1);
    }

    #[test]
    fn test_nested_scope_disposed_first() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let outer = effect_scope();
        outer.run(|| {
            let o = order.clone();
            on_scope_dispose(move || o.borrow_mut().push("outer"));
            let inner = effect_scope();
            inner.run(|| {
                let o = order.clone();
                on_scope_dispose(move || o.borrow_mut().push("inner"));
            });
        });
        outer.stop();
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_detached_scope_survives_parent() {
        let outer = effect_scope();
        let detached = outer.run(detached_scope);
        outer.stop();
        assert!(detached.is_active());
        detached.stop();
    }

    #[test]
    fn test_on_scope_dispose_outside_scope() {
        assert!(!on_scope_dispose(|| {}));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let scope = effect_scope();
        scope.run(|| {
            let c = count.clone();
            on_scope_dispose(move || *c.borrow_mut() += 1);
        });
        scope.stop();
        scope.stop();
        assert_eq!(*count.borrow(), 1);
    }
}
