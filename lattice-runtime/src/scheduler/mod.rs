//! Job Scheduling
//!
//! Writes never re-run their dependents inline. Effects with a scheduler
//! turn a notification into a [`Job`] pushed onto a thread-local queue, and
//! the host drains the queue at its tick boundary with [`flush_jobs`] (or by
//! awaiting [`next_tick`] under tokio). Because queues deduplicate by
//! [`JobId`], any number of writes in one turn cause at most one re-run per
//! computation.
//!
//! The queue keeps two priorities: pre-flush jobs (watch callbacks) always
//! settle before main jobs (effects and component re-renders) of the same
//! flush.

mod job;
mod queue;

pub use job::{Job, JobId};
pub use queue::{
    config, configure, flush_all, flush_jobs, has_pending_jobs, invalidate_job, is_flush_pending,
    next_tick, queue_job, queue_pre_flush,
};
