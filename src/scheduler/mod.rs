//! Scheduler - batched, ordered, deduplicated job execution.
//!
//! Dirty component render effects do not re-run inline. They enqueue a
//! [`Job`] here and the host drives [`flush_jobs`] once per turn:
//!
//! ```text
//! signal.set() → effect scheduler → queue_job() → [host turn] → flush_jobs()
//!                                                        │
//!                       pre-phase jobs (ascending order) ┤
//!                      post-flush callbacks (FIFO order) ┘
//! ```
//!
//! # Guarantees
//!
//! - A job id is queued at most once at a time. While a job runs it may
//!   queue itself again.
//! - Jobs run in ascending `order` (component tree depth), FIFO among equals.
//!   Parents therefore update before their children.
//! - Post-flush callbacks run after every pre-phase job of the same pass.
//! - A job running more than [`max_recursive_updates`](crate::config::max_recursive_updates)
//!   times in one flush is dropped with [`RuntimeError::MaxUpdateDepth`].
//! - An error from one job is reported and the flush carries on.
//!
//! There is no implicit event loop. [`set_flush_requester`] installs a hook
//! the scheduler calls once whenever work becomes pending.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::config;
use crate::error::{ErrorSource, Result, RuntimeError};

// =============================================================================
// Jobs
// =============================================================================

/// Identity used for deduplication and invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

thread_local! {
    static NEXT_JOB_ID: Cell<u64> = const { Cell::new(0) };
}

impl JobId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        NEXT_JOB_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            JobId(id)
        })
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

type JobFn = Rc<dyn Fn() -> Result<()>>;

/// A unit of deferred work.
#[derive(Clone)]
pub struct Job {
    pub id: JobId,
    /// Sort key. Component jobs use their tree depth.
    pub order: u32,
    /// Name used in diagnostics.
    pub label: Rc<str>,
    run: JobFn,
}

impl Job {
    pub fn new(
        id: JobId,
        order: u32,
        label: impl Into<Rc<str>>,
        run: impl Fn() -> Result<()> + 'static,
    ) -> Self {
        Self {
            id,
            order,
            label: label.into(),
            run: Rc::new(run),
        }
    }

    fn call(&self) -> Result<()> {
        (self.run)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("label", &self.label)
            .finish()
    }
}

/// Outcome of one [`flush_jobs`] call.
#[derive(Debug, Default)]
pub struct FlushSummary {
    /// Pre-phase jobs executed.
    pub jobs_run: usize,
    /// Post-flush callbacks executed.
    pub post_run: usize,
    /// Errors reported during the flush, in order.
    pub errors: Vec<RuntimeError>,
}

impl FlushSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Scheduler State
// =============================================================================

#[derive(Default)]
struct SchedulerState {
    /// Pre-phase queue, kept sorted by `order`.
    queue: Vec<Job>,
    /// Index of the pre-phase job currently running.
    running: Option<usize>,
    flushing: bool,
    flush_requested: bool,
    post: Vec<Job>,
    next_ticks: Vec<Box<dyn FnOnce()>>,
    requester: Option<Rc<dyn Fn()>>,
}

impl SchedulerState {
    /// First queue index that has not started yet.
    fn pending_start(&self) -> usize {
        self.running.map_or(0, |i| i + 1).min(self.queue.len())
    }

    fn has_work(&self) -> bool {
        self.queue.len() > self.pending_start() || !self.post.is_empty()
    }

    /// Requester to call after releasing the borrow, if a turn must be requested.
    fn take_request(&mut self) -> Option<Rc<dyn Fn()>> {
        if self.flushing || self.flush_requested {
            return None;
        }
        let requester = self.requester.clone()?;
        self.flush_requested = true;
        Some(requester)
    }
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

fn with_state<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

// =============================================================================
// Queueing
// =============================================================================

/// Queue a pre-phase job. Duplicate ids already pending are ignored.
pub fn queue_job(job: Job) {
    let request = with_state(|s| {
        let start = s.pending_start();
        if s.queue[start..].iter().any(|j| j.id == job.id) {
            return None;
        }
        let pos = start + s.queue[start..].partition_point(|j| j.order <= job.order);
        tracing::trace!(job = %job.id, label = %job.label, order = job.order, "queue job");
        s.queue.insert(pos, job);
        s.take_request()
    });
    if let Some(request) = request {
        request();
    }
}

/// Remove a pending job. The running job and already finished jobs are untouched.
pub fn invalidate_job(id: JobId) {
    with_state(|s| {
        let start = s.pending_start();
        if let Some(offset) = s.queue[start..].iter().position(|j| j.id == id) {
            s.queue.remove(start + offset);
        }
    })
}

/// Queue a callback for after the pre-phase. FIFO, duplicate ids ignored.
pub fn queue_post_flush_cb(job: Job) {
    let request = with_state(|s| {
        if s.post.iter().any(|j| j.id == job.id) {
            return None;
        }
        s.post.push(job);
        s.take_request()
    });
    if let Some(request) = request {
        request();
    }
}

/// Run `f` at the end of the next flush.
pub fn next_tick(f: impl FnOnce() + 'static) {
    let request = with_state(|s| {
        s.next_ticks.push(Box::new(f));
        s.take_request()
    });
    if let Some(request) = request {
        request();
    }
}

/// Install the hook that asks the host for a flush turn.
pub fn set_flush_requester(requester: impl Fn() + 'static) {
    with_state(|s| s.requester = Some(Rc::new(requester)));
}

/// Remove the flush requester.
pub fn clear_flush_requester() {
    with_state(|s| s.requester = None);
}

/// True when jobs, post-flush callbacks or next-tick callbacks are waiting.
pub fn has_pending_jobs() -> bool {
    with_state(|s| s.has_work() || !s.next_ticks.is_empty())
}

/// Number of queued pre-phase jobs that have not started.
pub fn pending_job_count() -> usize {
    with_state(|s| s.queue.len() - s.pending_start())
}

pub fn is_flushing() -> bool {
    with_state(|s| s.flushing)
}

/// Drop every queued job and callback (for testing).
pub fn reset_scheduler() {
    let old = with_state(std::mem::take);
    drop(old);
}

// =============================================================================
// Flushing
// =============================================================================

/// Resets the flushing flag when the flush ends, also by unwinding.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = STATE.try_with(|s| {
            if let Ok(mut s) = s.try_borrow_mut() {
                // After a panic, keep the jobs that never started.
                let done = s.pending_start();
                s.queue.drain(..done);
                s.running = None;
                s.flushing = false;
            }
        });
    }
}

struct RunCounts {
    limit: usize,
    seen: HashMap<JobId, usize>,
}

impl RunCounts {
    fn new() -> Self {
        Self {
            limit: config::max_recursive_updates(),
            seen: HashMap::new(),
        }
    }

    /// Count one run of `job`, failing once it exceeds the limit.
    fn check(&mut self, job: &Job) -> Result<()> {
        let count = self.seen.entry(job.id).or_insert(0);
        *count += 1;
        if *count > self.limit {
            return Err(RuntimeError::MaxUpdateDepth {
                job: job.label.to_string(),
                limit: self.limit,
            });
        }
        Ok(())
    }
}

fn report(summary: &mut FlushSummary, job: &Job, error: RuntimeError) {
    tracing::warn!(job = %job.id, label = %job.label, %error, "job failed");
    config::report_unhandled(&error, ErrorSource::Scheduler);
    summary.errors.push(error);
}

/// Run every queued job, then post-flush callbacks, until both are empty.
///
/// Re-entrant calls return an empty summary.
pub fn flush_jobs() -> FlushSummary {
    let entered = with_state(|s| {
        if s.flushing {
            return false;
        }
        s.flushing = true;
        s.flush_requested = false;
        s.running = None;
        true
    });
    if !entered {
        return FlushSummary::default();
    }

    let _span = tracing::debug_span!("flush_jobs").entered();
    let mut summary = FlushSummary::default();
    let mut counts = RunCounts::new();
    {
        let _guard = FlushGuard;
        loop {
            run_pre_phase(&mut summary, &mut counts);
            run_post_phase(&mut summary, &mut counts, true);
            if !with_state(|s| s.has_work()) {
                break;
            }
        }
    }

    let ticks = with_state(|s| std::mem::take(&mut s.next_ticks));
    for tick in ticks {
        tick();
    }

    tracing::debug!(
        jobs = summary.jobs_run,
        post = summary.post_run,
        errors = summary.errors.len(),
        "flush complete"
    );
    summary
}

fn run_pre_phase(summary: &mut FlushSummary, counts: &mut RunCounts) {
    let mut index = 0;
    loop {
        let job = with_state(|s| {
            let job = s.queue.get(index).cloned();
            if job.is_some() {
                s.running = Some(index);
            }
            job
        });
        let Some(job) = job else {
            break;
        };
        match counts.check(&job).and_then(|()| job.call()) {
            Ok(()) => summary.jobs_run += 1,
            Err(error) => report(summary, &job, error),
        }
        index += 1;
    }
    with_state(|s| {
        s.queue.clear();
        s.running = None;
    });
}

/// Drain post-flush callbacks. With `yield_to_jobs` the drain stops as soon
/// as a callback queues pre-phase work.
fn run_post_phase(summary: &mut FlushSummary, counts: &mut RunCounts, yield_to_jobs: bool) {
    loop {
        let batch = with_state(|s| std::mem::take(&mut s.post));
        if batch.is_empty() {
            break;
        }
        for job in batch {
            match counts.check(&job).and_then(|()| job.call()) {
                Ok(()) => summary.post_run += 1,
                Err(error) => report(summary, &job, error),
            }
        }
        if yield_to_jobs && pending_job_count() > 0 {
            // New pre-phase work goes first.
            break;
        }
    }
}

/// Run pending post-flush callbacks now. No-op inside a flush.
pub fn flush_post_flush_cbs() -> FlushSummary {
    let mut summary = FlushSummary::default();
    if is_flushing() {
        return summary;
    }
    let mut counts = RunCounts::new();
    run_post_phase(&mut summary, &mut counts, false);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{configure, reset_config, RuntimeConfig};

    fn recorder() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push_job(log: &Rc<RefCell<Vec<&'static str>>>, id: JobId, order: u32, name: &'static str) -> Job {
        let log = log.clone();
        Job::new(id, order, name, move || {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_jobs_run_in_order_and_dedupe() {
        reset_scheduler();
        let log = recorder();
        let child = JobId::next();
        let parent = JobId::next();
        queue_job(push_job(&log, child, 2, "child"));
        queue_job(push_job(&log, parent, 1, "parent"));
        queue_job(push_job(&log, child, 2, "child"));
        assert_eq!(pending_job_count(), 2);

        let summary = flush_jobs();
        assert_eq!(summary.jobs_run, 2);
        assert!(summary.is_clean());
        assert_eq!(*log.borrow(), vec!["parent", "child"]);
        assert!(!has_pending_jobs());
    }

    #[test]
    fn test_equal_order_is_fifo() {
        reset_scheduler();
        let log = recorder();
        queue_job(push_job(&log, JobId::next(), 0, "a"));
        queue_job(push_job(&log, JobId::next(), 0, "b"));
        queue_job(push_job(&log, JobId::next(), 0, "c"));
        flush_jobs();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_invalidate_removes_pending() {
        reset_scheduler();
        let log = recorder();
        let id = JobId::next();
        queue_job(push_job(&log, id, 0, "gone"));
        invalidate_job(id);
        assert_eq!(flush_jobs().jobs_run, 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_post_callbacks_after_pre_jobs() {
        reset_scheduler();
        let log = recorder();
        let log_clone = log.clone();
        let post_id = JobId::next();
        queue_job(Job::new(JobId::next(), 0, "pre", move || {
            log_clone.borrow_mut().push("pre");
            let log = log_clone.clone();
            queue_post_flush_cb(Job::new(post_id, 0, "post", move || {
                log.borrow_mut().push("post");
                Ok(())
            }));
            Ok(())
        }));
        queue_job(push_job(&log, JobId::next(), 5, "pre-late"));

        let summary = flush_jobs();
        assert_eq!(summary.post_run, 1);
        assert_eq!(*log.borrow(), vec!["pre", "pre-late", "post"]);
    }

    #[test]
    fn test_direct_post_flush_drains_chained_callbacks() {
        reset_scheduler();
        let log = recorder();
        let log_clone = log.clone();
        let second = JobId::next();
        queue_post_flush_cb(Job::new(JobId::next(), 0, "first", move || {
            log_clone.borrow_mut().push("first");
            queue_job(push_job(&log_clone, JobId::next(), 0, "pre"));
            queue_post_flush_cb(push_job(&log_clone, second, 0, "second"));
            Ok(())
        }));

        let summary = flush_post_flush_cbs();
        assert_eq!(summary.post_run, 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(pending_job_count(), 1);
    }

    #[test]
    fn test_self_requeue_hits_recursion_limit() {
        reset_scheduler();
        configure(RuntimeConfig::default().with_max_recursive_updates(5).with_error_handler(|_, _| {}));
        let runs = Rc::new(Cell::new(0));
        let id = JobId::next();

        fn make(id: JobId, runs: Rc<Cell<usize>>) -> Job {
            Job::new(id, 0, "looping", move || {
                runs.set(runs.get() + 1);
                queue_job(make(id, runs.clone()));
                Ok(())
            })
        }
        queue_job(make(id, runs.clone()));

        let summary = flush_jobs();
        assert_eq!(runs.get(), 5);
        assert_eq!(
            summary.errors,
            vec![RuntimeError::MaxUpdateDepth {
                job: "looping".into(),
                limit: 5
            }]
        );
        assert!(!has_pending_jobs());
        reset_config();
    }

    #[test]
    fn test_failing_job_does_not_block_others() {
        reset_scheduler();
        configure(RuntimeConfig::default().with_error_handler(|_, _| {}));
        let log = recorder();
        queue_job(Job::new(JobId::next(), 0, "bad", || {
            Err(RuntimeError::RendererBusy)
        }));
        queue_job(push_job(&log, JobId::next(), 1, "good"));

        let summary = flush_jobs();
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(*log.borrow(), vec!["good"]);
        reset_config();
    }

    #[test]
    fn test_flush_requester_called_once_per_turn() {
        reset_scheduler();
        let requests = Rc::new(Cell::new(0));
        let requests_clone = requests.clone();
        set_flush_requester(move || requests_clone.set(requests_clone.get() + 1));

        let log = recorder();
        queue_job(push_job(&log, JobId::next(), 0, "a"));
        queue_job(push_job(&log, JobId::next(), 0, "b"));
        assert_eq!(requests.get(), 1);

        flush_jobs();
        queue_job(push_job(&log, JobId::next(), 0, "c"));
        assert_eq!(requests.get(), 2);
        clear_flush_requester();
        reset_scheduler();
    }

    #[test]
    fn test_next_tick_runs_after_flush() {
        reset_scheduler();
        let log = recorder();
        let log_clone = log.clone();
        next_tick(move || log_clone.borrow_mut().push("tick"));
        queue_job(push_job(&log, JobId::next(), 0, "job"));
        flush_jobs();
        assert_eq!(*log.borrow(), vec!["job", "tick"]);
    }

    #[test]
    fn test_reentrant_flush_is_noop() {
        reset_scheduler();
        let inner_runs = Rc::new(Cell::new(usize::MAX));
        let inner_clone = inner_runs.clone();
        queue_job(Job::new(JobId::next(), 0, "outer", move || {
            inner_clone.set(flush_jobs().jobs_run);
            Ok(())
        }));
        flush_jobs();
        assert_eq!(inner_runs.get(), 0);
    }
}
