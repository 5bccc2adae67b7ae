use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use texter_common::{JobError, Result};

use super::{EnqueuedJob, JobQueue, perform_payload};
use crate::catalog::TexterCatalog;

/// In-process job queue
///
/// Jobs are kept in enqueue order and only run when asked to, which makes
/// this the queue of choice for tests and for single-process use where a
/// caller drives [`MemoryJobQueue::perform_enqueued`] itself.
///
/// # Capacity
/// With a capacity set, enqueueing onto a full queue fails with
/// [`JobError::Rejected`].
#[derive(Debug, Clone, Default)]
pub struct MemoryJobQueue {
    jobs: Arc<Mutex<VecDeque<EnqueuedJob>>>,
    capacity: Option<usize>,
}

impl MemoryJobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Arc::default(),
            capacity: Some(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// A snapshot of the queued jobs, oldest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<EnqueuedJob> {
        self.jobs.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn jobs_on(&self, queue: &str) -> Vec<EnqueuedJob> {
        self.jobs
            .lock()
            .iter()
            .filter(|job| job.schedule.queue == queue)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.jobs.lock().clear();
    }

    /// Perform jobs oldest first until the queue is empty, including any
    /// enqueued while performing. Schedules are ignored.
    ///
    /// Returns how many jobs ran.
    ///
    /// # Errors
    /// The first error a job did not handle. That job is gone from the
    /// queue; the rest stay.
    pub async fn perform_enqueued(&self, catalog: &TexterCatalog) -> Result<usize> {
        let mut performed = 0;
        loop {
            let next = self.jobs.lock().pop_front();
            let Some(job) = next else {
                return Ok(performed);
            };
            perform_payload(&job.payload, catalog).await?;
            performed += 1;
        }
    }

    /// Perform the jobs due at `now`, oldest first. Jobs enqueued while
    /// these run wait for the next call.
    ///
    /// # Errors
    /// As [`MemoryJobQueue::perform_enqueued`]. Due jobs after the failing
    /// one are dropped with it.
    pub async fn perform_due(&self, catalog: &TexterCatalog, now: DateTime<Utc>) -> Result<usize> {
        let due: Vec<EnqueuedJob> = {
            let mut jobs = self.jobs.lock();
            let (due, pending): (VecDeque<_>, VecDeque<_>) =
                jobs.drain(..).partition(|job| job.schedule.is_due(now));
            *jobs = pending;
            due.into()
        };

        for job in &due {
            perform_payload(&job.payload, catalog).await?;
        }
        Ok(due.len())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: EnqueuedJob) -> Result<()> {
        let mut jobs = self.jobs.lock();
        if let Some(capacity) = self.capacity
            && jobs.len() >= capacity
        {
            return Err(JobError::Rejected {
                queue: job.schedule.queue,
                reason: format!("capacity of {capacity} reached"),
            }
            .into());
        }

        jobs.push_back(job);
        Ok(())
    }
}
