//! Effects - computations that re-run when their dependencies change.
//!
//! An effect runs its body once on creation (unless `lazy`) and records every
//! signal read. A later write to any of those signals either re-runs the body
//! synchronously or, when a scheduler is attached, hands the effect to it.
//!
//! ```ignore
//! let name = signal("a".to_string());
//! let e = effect({
//!     let name = name.clone();
//!     move || println!("name = {}", name.get())
//! }, EffectOptions::default());
//! name.set("b".into()); // prints again
//! e.stop();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{self, EffectId};
use crate::scheduler::{self, Job, JobId};

/// Called instead of re-running the effect when it goes dirty.
pub type EffectScheduler = Rc<dyn Fn(Effect)>;

/// When a dirty effect re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// Immediately inside the write that dirtied it.
    #[default]
    Sync,
    /// As a pre-phase scheduler job.
    Pre,
    /// As a post-flush callback.
    Post,
}

/// Options for [`effect`].
#[derive(Default)]
pub struct EffectOptions {
    /// Skip the initial run.
    pub lazy: bool,
    /// Custom scheduler. Takes precedence over `flush`.
    pub scheduler: Option<EffectScheduler>,
    pub flush: Flush,
    /// Let the effect re-trigger itself while running.
    pub allow_recurse: bool,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn with_flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_stop(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("flush", &self.flush)
            .field("allow_recurse", &self.allow_recurse)
            .finish()
    }
}

/// Handle to a live effect. Copying the handle does not copy the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    id: EffectId,
}

/// Create an effect.
///
/// The effect belongs to the running [`EffectScope`](super::EffectScope), if
/// any, and stops with it.
pub fn effect(f: impl FnMut() + 'static, options: EffectOptions) -> Effect {
    let EffectOptions {
        lazy,
        scheduler,
        flush,
        allow_recurse,
        on_stop,
    } = options;

    // The scheduler hook needs the effect handle, which exists only after
    // registration.
    let handle: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
    let hook: Option<runtime::SchedulerHook> = match (scheduler, flush) {
        (Some(custom), _) => {
            let handle = handle.clone();
            Some(Rc::new(move || {
                let current = *handle.borrow();
                if let Some(effect) = current {
                    custom(effect);
                }
            }))
        }
        (None, Flush::Sync) => None,
        (None, mode) => Some(queued_hook(handle.clone(), mode)),
    };

    let run: runtime::EffectFn = Rc::new(RefCell::new(f));
    let id = runtime::create_effect(run, hook, allow_recurse, on_stop);
    let effect = Effect { id };
    *handle.borrow_mut() = Some(effect);

    if !lazy {
        effect.run();
    }
    effect
}

fn queued_hook(handle: Rc<RefCell<Option<Effect>>>, mode: Flush) -> runtime::SchedulerHook {
    let job_id = JobId::next();
    Rc::new(move || {
        let current = *handle.borrow();
        let Some(effect) = current else {
            return;
        };
        let job = Job::new(job_id, 0, "effect", move || {
            if effect.is_active() && effect.is_dirty() {
                effect.run();
            }
            Ok(())
        });
        match mode {
            Flush::Post => scheduler::queue_post_flush_cb(job),
            _ => scheduler::queue_job(job),
        }
    })
}

impl Effect {
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Re-run the body with tracking. No-op once stopped.
    pub fn run(&self) {
        runtime::run_effect(self.id);
    }

    /// Unsubscribe from every dependency and drop the body.
    pub fn stop(&self) {
        runtime::stop_effect(self.id);
    }

    pub fn is_active(&self) -> bool {
        runtime::effect_is_active(self.id)
    }

    /// A dependency changed since the last run.
    pub fn is_dirty(&self) -> bool {
        runtime::effect_is_dirty(self.id)
    }

    /// Number of distinct cells read during the last run.
    pub fn dependency_count(&self) -> usize {
        runtime::effect_dependency_count(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{signal, untrack};
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn counter() -> (Rc<Cell<usize>>, impl Fn()) {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        (runs, move || r.set(r.get() + 1))
    }

    #[test]
    fn test_effect_runs_and_reruns() {
        let a = signal(1);
        let (runs, bump) = counter();
        let a_clone = a.clone();
        let _e = effect(
            move || {
                a_clone.get();
                bump();
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);
        a.set(2);
        a.set(3);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_lazy_effect_waits_for_run() {
        let (runs, bump) = counter();
        let e = effect(bump, EffectOptions::default().lazy());
        assert_eq!(runs.get(), 0);
        assert!(e.is_dirty());
        e.run();
        assert_eq!(runs.get(), 1);
        assert!(!e.is_dirty());
    }

    #[test]
    fn test_dependency_pruning_on_branch_switch() {
        let flag = signal(true);
        let a = signal(1);
        let b = signal(2);
        let (runs, bump) = counter();

        let (f, a2, b2) = (flag.clone(), a.clone(), b.clone());
        let e = effect(
            move || {
                if f.get() {
                    a2.get();
                } else {
                    b2.get();
                }
                bump();
            },
            EffectOptions::default(),
        );
        assert_eq!(e.dependency_count(), 2);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.set(false);
        assert_eq!(runs.get(), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // `a` is no longer a dependency.
        a.set(10);
        assert_eq!(runs.get(), 2);
        b.set(20);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_stop_unsubscribes() {
        let a = signal(0);
        let (runs, bump) = counter();
        let a_clone = a.clone();
        let stopped = Rc::new(Cell::new(false));
        let stopped_clone = stopped.clone();
        let e = effect(
            move || {
                a_clone.get();
                bump();
            },
            EffectOptions::default().on_stop(move || stopped_clone.set(true)),
        );
        e.stop();
        assert!(stopped.get());
        assert!(!e.is_active());
        assert_eq!(a.subscriber_count(), 0);
        a.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_custom_scheduler_receives_effect() {
        let a = signal(0);
        let scheduled = Rc::new(Cell::new(0));
        let scheduled_clone = scheduled.clone();
        let a_clone = a.clone();
        let e = effect(
            move || {
                a_clone.get();
            },
            EffectOptions::default().with_scheduler(move |_| {
                scheduled_clone.set(scheduled_clone.get() + 1)
            }),
        );
        a.set(1);
        a.set(2);
        assert_eq!(scheduled.get(), 2);
        assert!(e.is_dirty());
    }

    #[test]
    fn test_self_trigger_ignored_without_allow_recurse() {
        let a = signal(0);
        let (runs, bump) = counter();
        let a_clone = a.clone();
        let _e = effect(
            move || {
                let v = a_clone.get();
                if v < 5 {
                    a_clone.set(v + 1);
                }
                bump();
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);
        assert_eq!(a.get_untracked(), 1);
    }

    #[test]
    fn test_allow_recurse_reruns_until_stable() {
        let a = signal(0);
        let a_clone = a.clone();
        let _e = effect(
            move || {
                let v = a_clone.get();
                if v < 5 {
                    a_clone.set(v + 1);
                }
            },
            EffectOptions::default().allow_recurse(),
        );
        assert_eq!(a.get_untracked(), 5);
    }

    #[test]
    fn test_untrack_skips_dependencies() {
        let a = signal(0);
        let b = signal(0);
        let (a2, b2) = (a.clone(), b.clone());
        let e = effect(
            move || {
                a2.get();
                untrack(|| b2.get());
            },
            EffectOptions::default(),
        );
        assert_eq!(e.dependency_count(), 1);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_observer_stack_restored_after_panic() {
        let depth = runtime::observer_depth();
        let result = catch_unwind(AssertUnwindSafe(|| {
            effect(|| panic!("boom"), EffectOptions::default());
        }));
        assert!(result.is_err());
        assert_eq!(runtime::observer_depth(), depth);
        assert!(runtime::current_effect().is_none());
    }

    #[test]
    fn test_pre_flush_effect_batches() {
        scheduler::reset_scheduler();
        let a = signal(0);
        let (runs, bump) = counter();
        let a_clone = a.clone();
        let _e = effect(
            move || {
                a_clone.get();
                bump();
            },
            EffectOptions::default().with_flush(Flush::Pre),
        );
        a.set(1);
        a.set(2);
        a.set(3);
        assert_eq!(runs.get(), 1);
        let summary = scheduler::flush_jobs();
        assert_eq!(summary.jobs_run, 1);
        assert_eq!(runs.get(), 2);
    }
}
