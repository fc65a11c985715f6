//! Reactive runtime - the dependency graph.
//!
//! All graph state lives in one thread-local [`Graph`]:
//!
//! - `subscribers`: cell id → effects that read it during their last run
//! - `effects`: effect id → run function, scheduler hook, dependency set
//! - `scopes`: ownership units that stop every effect created inside them
//! - `observer_stack`: the currently running computations (`None` frames pause tracking)
//!
//! Cells and effects reference each other only by id. A cell's subscriber set
//! is owned by the graph; an effect's dependency set holds plain cell ids.
//!
//! # Tracking
//!
//! Each run of an effect is two-phase:
//!
//! 1. The previous dependency set is detached and kept aside.
//! 2. Every read during the run records the edge in both directions.
//! 3. After the run, cells that were dependencies before but were not read
//!    again are unsubscribed.
//!
//! The observer stack is restored by a drop guard, so unwinding out of an
//! effect body leaves the graph consistent.
//!
//! User closures are never called while the graph is borrowed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;

// =============================================================================
// Ids
// =============================================================================

/// Identity of a reactive cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

/// Identity of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

/// Identity of an effect scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

pub(crate) type EffectFn = Rc<RefCell<dyn FnMut()>>;
pub(crate) type SchedulerHook = Rc<dyn Fn()>;
type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Graph State
// =============================================================================

struct EffectNode {
    run: EffectFn,
    scheduler: Option<SchedulerHook>,
    deps: IndexSet<CellId>,
    dirty: bool,
    running: bool,
    allow_recurse: bool,
    on_stop: Option<Cleanup>,
}

struct ScopeNode {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    effects: Vec<EffectId>,
    cleanups: Vec<Cleanup>,
}

#[derive(Default)]
struct Graph {
    next_id: u64,
    subscribers: HashMap<CellId, IndexSet<EffectId>>,
    effects: HashMap<EffectId, EffectNode>,
    scopes: HashMap<ScopeId, ScopeNode>,
    observer_stack: Vec<Option<EffectId>>,
    scope_stack: Vec<ScopeId>,
}

impl Graph {
    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn unsubscribe(&mut self, cell: CellId, effect: EffectId) {
        if let Some(subs) = self.subscribers.get_mut(&cell) {
            subs.shift_remove(&effect);
        }
    }
}

thread_local! {
    static GRAPH: RefCell<Graph> = RefCell::new(Graph::default());
}

fn with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
    GRAPH.with(|g| f(&mut g.borrow_mut()))
}

/// Graph access from drop paths: no-op during thread teardown or while borrowed.
fn try_with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> Option<R> {
    GRAPH
        .try_with(|g| g.try_borrow_mut().ok().map(|mut g| f(&mut g)))
        .ok()
        .flatten()
}

/// Truncates the observer stack back to `depth` when dropped.
struct ObserverFrame {
    depth: usize,
}

impl Drop for ObserverFrame {
    fn drop(&mut self) {
        let depth = self.depth;
        try_with_graph(|g| g.observer_stack.truncate(depth));
    }
}

fn push_observer(frame: Option<EffectId>) -> ObserverFrame {
    let depth = with_graph(|g| {
        g.observer_stack.push(frame);
        g.observer_stack.len() - 1
    });
    ObserverFrame { depth }
}

// =============================================================================
// Cells
// =============================================================================

pub(crate) fn create_cell() -> CellId {
    with_graph(|g| {
        let id = CellId(g.alloc());
        g.subscribers.insert(id, IndexSet::new());
        id
    })
}

pub(crate) fn dispose_cell(cell: CellId) {
    try_with_graph(|g| {
        if let Some(subs) = g.subscribers.remove(&cell) {
            for effect in subs {
                if let Some(node) = g.effects.get_mut(&effect) {
                    node.deps.shift_remove(&cell);
                }
            }
        }
    });
}

/// Record that the running computation (if any) read `cell`.
pub(crate) fn track(cell: CellId) {
    with_graph(|g| {
        let Some(Some(effect)) = g.observer_stack.last().copied() else {
            return;
        };
        let Some(node) = g.effects.get_mut(&effect) else {
            return;
        };
        if node.deps.insert(cell) {
            g.subscribers.entry(cell).or_default().insert(effect);
        }
    })
}

/// Notify every subscriber of `cell`.
pub(crate) fn trigger(cell: CellId) {
    let subs: Vec<EffectId> = with_graph(|g| {
        g.subscribers
            .get(&cell)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    });
    if !subs.is_empty() {
        tracing::trace!(?cell, subscribers = subs.len(), "trigger");
    }
    for effect in subs {
        notify(effect);
    }
}

pub(crate) fn subscriber_count(cell: CellId) -> usize {
    with_graph(|g| g.subscribers.get(&cell).map_or(0, |s| s.len()))
}

// =============================================================================
// Effects
// =============================================================================

enum Notify {
    Schedule(SchedulerHook),
    Run,
    Skip,
}

fn notify(effect: EffectId) {
    let action = with_graph(|g| {
        let Some(node) = g.effects.get_mut(&effect) else {
            return Notify::Skip;
        };
        if node.running && !node.allow_recurse {
            return Notify::Skip;
        }
        node.dirty = true;
        match (&node.scheduler, node.running) {
            (Some(scheduler), _) => Notify::Schedule(scheduler.clone()),
            // Re-run happens in the loop of the run already in progress.
            (None, true) => Notify::Skip,
            (None, false) => Notify::Run,
        }
    });
    match action {
        Notify::Schedule(scheduler) => scheduler(),
        Notify::Run => run_effect(effect),
        Notify::Skip => {}
    }
}

pub(crate) fn create_effect(
    run: EffectFn,
    scheduler: Option<SchedulerHook>,
    allow_recurse: bool,
    on_stop: Option<Cleanup>,
) -> EffectId {
    with_graph(|g| {
        let id = EffectId(g.alloc());
        g.effects.insert(
            id,
            EffectNode {
                run,
                scheduler,
                deps: IndexSet::new(),
                dirty: true,
                running: false,
                allow_recurse,
                on_stop,
            },
        );
        if let Some(scope) = g.scope_stack.last().copied() {
            if let Some(node) = g.scopes.get_mut(&scope) {
                node.effects.push(id);
            }
        }
        id
    })
}

/// Finishes one effect run: restores the observer stack and prunes stale
/// subscriptions, also when the body unwinds.
struct RunGuard {
    effect: EffectId,
    previous_deps: IndexSet<CellId>,
    _frame: ObserverFrame,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let effect = self.effect;
        let previous = std::mem::take(&mut self.previous_deps);
        try_with_graph(|g| {
            let stale: Vec<CellId> = match g.effects.get_mut(&effect) {
                Some(node) => {
                    node.running = false;
                    previous
                        .into_iter()
                        .filter(|cell| !node.deps.contains(cell))
                        .collect()
                }
                // Stopped mid-run.
                None => previous.into_iter().collect(),
            };
            for cell in stale {
                g.unsubscribe(cell, effect);
            }
        });
    }
}

fn begin_run(effect: EffectId) -> Option<(EffectFn, IndexSet<CellId>)> {
    with_graph(|g| {
        let node = g.effects.get_mut(&effect)?;
        if node.running {
            return None;
        }
        node.running = true;
        node.dirty = false;
        let previous = std::mem::take(&mut node.deps);
        Some((node.run.clone(), previous))
    })
}

/// Run an effect with tracking.
pub(crate) fn run_effect(effect: EffectId) {
    let limit = crate::config::max_recursive_updates();
    let mut passes = 0usize;
    loop {
        let Some((run, previous_deps)) = begin_run(effect) else {
            return;
        };
        {
            let _guard = RunGuard {
                effect,
                previous_deps,
                _frame: push_observer(Some(effect)),
            };
            (run.borrow_mut())();
        }
        passes += 1;

        let rerun = with_graph(|g| {
            g.effects
                .get(&effect)
                .is_some_and(|n| n.dirty && n.allow_recurse && n.scheduler.is_none())
        });
        if !rerun {
            return;
        }
        if passes >= limit {
            tracing::warn!(?effect, limit, "recursive effect stopped re-running");
            return;
        }
    }
}

pub(crate) fn stop_effect(effect: EffectId) {
    let node = with_graph(|g| {
        let node = g.effects.remove(&effect)?;
        for cell in &node.deps {
            g.unsubscribe(*cell, effect);
        }
        Some(node)
    });
    // Dropped outside the borrow: captured signals unregister themselves.
    if let Some(mut node) = node {
        if let Some(on_stop) = node.on_stop.take() {
            on_stop();
        }
    }
}

pub(crate) fn effect_is_active(effect: EffectId) -> bool {
    with_graph(|g| g.effects.contains_key(&effect))
}

pub(crate) fn effect_is_dirty(effect: EffectId) -> bool {
    with_graph(|g| g.effects.get(&effect).is_some_and(|n| n.dirty))
}

pub(crate) fn effect_dependency_count(effect: EffectId) -> usize {
    with_graph(|g| g.effects.get(&effect).map_or(0, |n| n.deps.len()))
}

/// Effect currently collecting dependencies, if any.
pub fn current_effect() -> Option<EffectId> {
    with_graph(|g| g.observer_stack.last().copied().flatten())
}

/// Depth of the observer stack (including paused frames).
pub fn observer_depth() -> usize {
    with_graph(|g| g.observer_stack.len())
}

/// Run `f` without tracking any reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _frame = push_observer(None);
    f()
}

// =============================================================================
// Scopes
// =============================================================================

struct ScopeFrame {
    depth: usize,
}

impl Drop for ScopeFrame {
    fn drop(&mut self) {
        let depth = self.depth;
        try_with_graph(|g| g.scope_stack.truncate(depth));
    }
}

pub(crate) fn create_scope(detached: bool) -> ScopeId {
    with_graph(|g| {
        let id = ScopeId(g.alloc());
        let parent = if detached {
            None
        } else {
            g.scope_stack.last().copied()
        };
        g.scopes.insert(
            id,
            ScopeNode {
                parent,
                children: Vec::new(),
                effects: Vec::new(),
                cleanups: Vec::new(),
            },
        );
        if let Some(parent) = parent {
            if let Some(node) = g.scopes.get_mut(&parent) {
                node.children.push(id);
            }
        }
        id
    })
}

pub(crate) fn run_in_scope<R>(scope: ScopeId, f: impl FnOnce() -> R) -> R {
    let depth = with_graph(|g| {
        g.scope_stack.push(scope);
        g.scope_stack.len() - 1
    });
    let _frame = ScopeFrame { depth };
    f()
}

pub(crate) fn scope_is_active(scope: ScopeId) -> bool {
    with_graph(|g| g.scopes.contains_key(&scope))
}

pub(crate) fn stop_scope(scope: ScopeId) {
    let node = with_graph(|g| {
        let node = g.scopes.remove(&scope)?;
        if let Some(parent) = node.parent {
            if let Some(parent_node) = g.scopes.get_mut(&parent) {
                parent_node.children.retain(|c| *c != scope);
            }
        }
        Some(node)
    });
    let Some(node) = node else {
        return;
    };
    for child in node.children {
        stop_scope(child);
    }
    for effect in node.effects {
        stop_effect(effect);
    }
    for cleanup in node.cleanups {
        cleanup();
    }
}

/// Register `cleanup` on the innermost running scope.
///
/// Returns the callback back when no scope is running.
pub(crate) fn register_scope_cleanup(cleanup: Cleanup) -> Option<Cleanup> {
    with_graph(|g| match g.scope_stack.last().copied() {
        Some(scope) => match g.scopes.get_mut(&scope) {
            Some(node) => {
                node.cleanups.push(cleanup);
                None
            }
            None => Some(cleanup),
        },
        None => Some(cleanup),
    })
}
