//! Scheduler jobs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::reactive::Subscriber;

/// Identity of a job. Queues deduplicate on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Generate a new unique job ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Task = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// A unit of deferred work.
///
/// A job may name the effect that owns it; once that effect is stopped (or
/// dropped) the job is skipped even if it is still queued.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    task: Task,
    owner: Option<Weak<dyn Subscriber>>,
}

impl Job {
    pub fn new<F>(id: JobId, task: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id,
            task: Arc::new(task),
            owner: None,
        }
    }

    /// Tie the job's liveness to a subscriber.
    pub fn with_owner(mut self, owner: Weak<dyn Subscriber>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether the job should still run.
    pub fn is_live(&self) -> bool {
        match &self.owner {
            None => true,
            Some(owner) => owner.upgrade().is_some_and(|owner| owner.is_active()),
        }
    }

    pub(crate) fn run(&self) -> Result<()> {
        (self.task)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;

    #[test]
    fn unowned_jobs_are_always_live() {
        let job = Job::new(JobId::next(), || Ok(()));
        assert!(job.is_live());
        assert!(job.run().is_ok());
    }

    #[test]
    fn owned_jobs_die_with_their_effect() {
        let effect = Effect::new(|| ());
        let job = Job::new(JobId::next(), || Ok(())).with_owner(effect.as_subscriber());
        assert!(job.is_live());

        effect.stop();
        assert!(!job.is_live());

        let dropped = Effect::new(|| ());
        let job = Job::new(JobId::next(), || Ok(())).with_owner(dropped.as_subscriber());
        drop(dropped);
        assert!(!job.is_live());
    }
}
