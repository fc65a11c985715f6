//! Signals - mutable reactive cells.
//!
//! ```ignore
//! let count = signal(0);
//! let doubled = derived({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{self, CellId};

type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
    id: CellId,
    value: RefCell<T>,
    equals: Option<EqualsFn<T>>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        runtime::dispose_cell(self.id);
    }
}

/// A reactive cell. Clones share the same value.
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a signal whose writes are skipped when the new value equals the old.
pub fn signal<T: PartialEq + 'static>(value: T) -> Signal<T> {
    signal_with_equals(value, |a, b| a == b)
}

/// Create a signal with a custom equality check.
pub fn signal_with_equals<T: 'static>(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Signal<T> {
    Signal::build(value, Some(Rc::new(equals)))
}

/// Create a signal that notifies on every write.
pub fn signal_always<T: 'static>(value: T) -> Signal<T> {
    Signal::build(value, None)
}

/// Reactive state wrapper. Reading any part of the value tracks the whole.
pub fn reactive<T: PartialEq + 'static>(value: T) -> Signal<T> {
    signal(value)
}

impl<T: 'static> Signal<T> {
    fn build(value: T, equals: Option<EqualsFn<T>>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: runtime::create_cell(),
                value: RefCell::new(value),
                equals,
            }),
        }
    }

    /// Cell identity.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Read the value, tracking this signal in the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        runtime::track(self.inner.id);
        self.inner.value.borrow().clone()
    }

    /// Read without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the value for the duration of `f`, tracking this signal.
    ///
    /// Writing to the same signal inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        runtime::track(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Borrow without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Write a value. Equal writes are dropped without notifying anyone.
    pub fn set(&self, value: T) {
        if let Some(equals) = &self.inner.equals {
            if equals(&self.inner.value.borrow(), &value) {
                return;
            }
        }
        *self.inner.value.borrow_mut() = value;
        runtime::trigger(self.inner.id);
    }

    /// Mutate in place. Always notifies.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        runtime::trigger(self.inner.id);
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        runtime::subscriber_count(self.inner.id)
    }

    /// True when both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, EffectOptions};
    use std::cell::Cell;

    #[test]
    fn test_signal_get_set() {
        let s = signal(1);
        assert_eq!(s.get(), 1);
        s.set(2);
        assert_eq!(s.get(), 2);
        assert_eq!(s.get_untracked(), 2);
    }

    #[test]
    fn test_equal_write_does_not_notify() {
        let s = signal(7);
        let runs = Rc::new(Cell::new(0));
        let s_clone = s.clone();
        let runs_clone = runs.clone();
        let _e = effect(
            move || {
                s_clone.get();
                runs_clone.set(runs_clone.get() + 1);
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);

        s.set(7);
        assert_eq!(runs.get(), 1);

        s.set(8);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_signal_always_notifies() {
        let s = signal_always(0);
        let runs = Rc::new(Cell::new(0));
        let s_clone = s.clone();
        let runs_clone = runs.clone();
        let _e = effect(
            move || {
                s_clone.with(|_| ());
                runs_clone.set(runs_clone.get() + 1);
            },
            EffectOptions::default(),
        );
        s.set(0);
        s.set(0);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_update_in_place() {
        let list = signal(vec![1, 2]);
        list.update(|v| v.push(3));
        assert_eq!(list.with(|v| v.len()), 3);
    }

    #[test]
    fn test_drop_unsubscribes_cell() {
        let e = {
            let s = signal(0);
            let s_clone = s.clone();
            let e = effect(
                move || {
                    s_clone.get();
                },
                EffectOptions::default(),
            );
            assert_eq!(s.subscriber_count(), 1);
            assert_eq!(e.dependency_count(), 1);
            e
        };
        // The effect still owns a clone, so the cell is alive until it stops.
        e.stop();
        assert!(!e.is_active());
    }
}
