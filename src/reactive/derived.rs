//! Derived values - cached computations over other cells.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::effect::{effect, Effect, EffectOptions};
use super::signal::{signal, Signal};

struct DerivedInner<T: 'static> {
    value: Signal<T>,
    effect: Effect,
}

impl<T: 'static> Drop for DerivedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

/// A read-only cell recomputed eagerly whenever its inputs change.
///
/// Downstream readers are only notified when the recomputed value differs.
pub struct Derived<T: 'static> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a derived value.
pub fn derived<T: Clone + PartialEq + 'static>(f: impl Fn() -> T + 'static) -> Derived<T> {
    let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));
    let slot_clone = slot.clone();
    let effect = effect(
        move || {
            let next = f();
            let existing = slot_clone.borrow().clone();
            match existing {
                Some(cell) => cell.set(next),
                None => *slot_clone.borrow_mut() = Some(signal(next)),
            }
        },
        EffectOptions::default(),
    );
    let Some(value) = slot.borrow().clone() else {
        unreachable!("derived computation runs on creation");
    };

    Derived {
        inner: Rc::new(DerivedInner { value, effect }),
    }
}

impl<T: Clone + 'static> Derived<T> {
    /// Current value, tracked.
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.value.with(f)
    }

    /// Underlying computation.
    pub fn effect(&self) -> Effect {
        self.inner.effect
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Derived").field(&self.inner.value).finish()
    }
}
