//! Scheduler Queue
//!
//! Two thread-local queues feed one flush:
//!
//! 1. The pre-flush queue (watch callbacks). It drains with a growing loop:
//!    jobs queued by other pre-flush jobs run in the same flush, so chained
//!    state updates settle before anything renders.
//! 2. The main queue (effects and component re-renders). A flush takes a
//!    snapshot; jobs queued while the snapshot runs wait for the next flush.
//!
//! Both queues keep insertion order and ignore a job whose ID is already
//! pending. Nothing runs inside the write that queued it: the host calls
//! [`flush_jobs`] (or awaits [`next_tick`]) at its tick boundary.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use indexmap::IndexMap;

use super::job::{Job, JobId};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};

#[derive(Default)]
struct Queues {
    pre: IndexMap<JobId, Job>,
    main: IndexMap<JobId, Job>,
    config: RuntimeConfig,
}

thread_local! {
    static QUEUES: RefCell<Queues> = RefCell::new(Queues::default());
    static FLUSH_PENDING: Cell<bool> = const { Cell::new(false) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Install limits for this thread's scheduler.
pub fn configure(config: RuntimeConfig) {
    QUEUES.with(|queues| queues.borrow_mut().config = config);
}

/// The limits in effect on this thread.
pub fn config() -> RuntimeConfig {
    QUEUES.with(|queues| queues.borrow().config.clone())
}

/// Queue a main job (effect re-run, component re-render).
///
/// Queueing only marks a flush as pending. Nothing runs until the host
/// calls [`flush_jobs`] or [`flush_all`], or awaits [`next_tick`]. Hosts
/// poll [`is_flush_pending`] at their tick boundary.
pub fn queue_job(job: Job) {
    let id = job.id();
    let inserted = QUEUES.with(|queues| {
        let mut queues = queues.borrow_mut();
        if queues.main.contains_key(&id) {
            false
        } else {
            queues.main.insert(id, job);
            true
        }
    });
    if inserted {
        tracing::trace!(job = id.raw(), "queued job");
        request_flush();
    }
}

/// Queue a pre-flush job (watch callback).
///
/// Like [`queue_job`], this never runs anything itself.
pub fn queue_pre_flush(job: Job) {
    let id = job.id();
    let inserted = QUEUES.with(|queues| {
        let mut queues = queues.borrow_mut();
        if queues.pre.contains_key(&id) {
            false
        } else {
            queues.pre.insert(id, job);
            true
        }
    });
    if inserted {
        tracing::trace!(job = id.raw(), "queued pre-flush job");
        request_flush();
    }
}

/// Drop a pending job, wherever it is queued.
pub fn invalidate_job(id: JobId) {
    QUEUES.with(|queues| {
        let mut queues = queues.borrow_mut();
        queues.pre.shift_remove(&id);
        queues.main.shift_remove(&id);
    });
}

/// Whether any job is waiting.
pub fn has_pending_jobs() -> bool {
    QUEUES.with(|queues| {
        let queues = queues.borrow();
        !queues.pre.is_empty() || !queues.main.is_empty()
    })
}

/// Whether a flush has been requested since the last one ran.
pub fn is_flush_pending() -> bool {
    FLUSH_PENDING.with(Cell::get)
}

fn request_flush() {
    FLUSH_PENDING.with(|pending| pending.set(true));
}

struct FlushGuard;

impl FlushGuard {
    fn enter() -> Option<Self> {
        FLUSHING.with(|flushing| {
            if flushing.get() {
                None
            } else {
                flushing.set(true);
                Some(FlushGuard)
            }
        })
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.with(|flushing| flushing.set(false));
        FLUSH_PENDING.with(|pending| pending.set(has_pending_jobs()));
    }
}

/// Run one flush cycle: drain the pre-flush queue, then run the main queue
/// snapshot.
///
/// Calling this from inside a running job is a no-op. On error the jobs of
/// the snapshot that did not run yet are put back at the front of the main
/// queue.
pub fn flush_jobs() -> Result<()> {
    let Some(_guard) = FlushGuard::enter() else {
        return Ok(());
    };
    FLUSH_PENDING.with(|pending| pending.set(false));

    let limit = config().recursion_limit;
    let mut runs: HashMap<JobId, usize> = HashMap::new();

    flush_pre(limit, &mut runs)?;

    let snapshot: Vec<Job> =
        QUEUES.with(|queues| queues.borrow_mut().main.drain(..).map(|(_, job)| job).collect());
    tracing::debug!(jobs = snapshot.len(), "flushing main queue");

    let mut remaining = snapshot.into_iter();
    while let Some(job) = remaining.next() {
        if let Err(err) = run_counted(&job, limit, &mut runs) {
            requeue_front(remaining.collect());
            return Err(err);
        }
    }
    Ok(())
}

/// Flush until both queues are empty.
pub fn flush_all() -> Result<()> {
    if FLUSHING.with(Cell::get) {
        return Ok(());
    }
    let cycles = config().max_flush_cycles;
    for _ in 0..cycles {
        if !has_pending_jobs() {
            return Ok(());
        }
        flush_jobs()?;
    }
    if has_pending_jobs() {
        return Err(RuntimeError::FlushLimit { cycles });
    }
    Ok(())
}

/// Yield to the async runtime once, then flush until quiet.
///
/// This is the tick boundary for hosts running on tokio: writes made before
/// the await are coalesced into one re-run per computation.
pub async fn next_tick() -> Result<()> {
    tokio::task::yield_now().await;
    flush_all()
}

fn flush_pre(limit: usize, runs: &mut HashMap<JobId, usize>) -> Result<()> {
    loop {
        let batch: Vec<Job> =
            QUEUES.with(|queues| queues.borrow_mut().pre.drain(..).map(|(_, job)| job).collect());
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(jobs = batch.len(), "flushing pre-flush queue");
        for job in batch {
            run_counted(&job, limit, runs)?;
        }
    }
}

fn run_counted(job: &Job, limit: usize, runs: &mut HashMap<JobId, usize>) -> Result<()> {
    if !job.is_live() {
        tracing::trace!(job = job.id().raw(), "skipping stopped job");
        return Ok(());
    }
    let count = runs.entry(job.id()).or_insert(0);
    *count += 1;
    if *count > limit {
        tracing::error!(job = job.id().raw(), limit, "job recursion limit exceeded");
        return Err(RuntimeError::RecursionLimit {
            job: job.id(),
            limit,
        });
    }
    job.run()
}

fn requeue_front(jobs: Vec<Job>) {
    if jobs.is_empty() {
        return;
    }
    QUEUES.with(|queues| {
        let mut queues = queues.borrow_mut();
        let newer = std::mem::take(&mut queues.main);
        for job in jobs {
            queues.main.insert(job.id(), job);
        }
        for (id, job) in newer {
            queues.main.entry(id).or_insert(job);
        }
    });
    request_flush();
}
