//! The job store is the single source of truth for job records. Every in-memory copy of a
//! `Job` elsewhere in the master is scratch.

pub use self::memory::MemoryJobStore;

mod memory;

use chrono::prelude::*;

use common::{Job, JobId, JobSpec, JobStatus};
use errors::*;

/// Selects records by equality on the fields that are set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub app: Option<String>,
    pub host: Option<String>,
}

impl JobFilter {
    pub fn all() -> Self {
        Default::default()
    }

    pub fn with_status(status: JobStatus) -> Self {
        JobFilter {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(ref app) = self.app {
            if &job.app != app {
                return false;
            }
        }
        if let Some(ref host) = self.host {
            if job.host.as_ref() != Some(host) {
                return false;
            }
        }
        true
    }
}

/// `JobStore` is the document store interface the scheduling core is written against.
///
/// Writes are keyed by job id and last-writer-wins, except for the status field: no write may
/// move a record backwards along `unscheduled -> init -> running -> {exited | error}` or out of
/// a terminal status.
pub trait JobStore: Send + Sync {
    /// Stores a new record with status `unscheduled` and the current time as `ctime`.
    fn insert(&self, spec: JobSpec) -> Result<JobId>;

    /// Matching records in insertion order.
    fn find(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    fn find_one(&self, id: &JobId) -> Result<Option<Job>>;

    /// Overwrites the record. An illegal status change is dropped and the stored status kept.
    fn replace(&self, id: &JobId, job: &Job) -> Result<()>;

    fn count(&self, filter: &JobFilter) -> Result<usize>;

    fn distinct_statuses(&self) -> Result<Vec<JobStatus>>;

    /// Atomically moves an `unscheduled` record to `init` on `host`. Returns false if the record
    /// was no longer unscheduled.
    fn claim(&self, id: &JobId, host: &str) -> Result<bool>;

    /// Atomically hands an `init` record back to the scheduler: status `unscheduled`, no host.
    /// Only for jobs whose container was never started. Returns false if the record had moved
    /// past `init`.
    fn unclaim(&self, id: &JobId) -> Result<bool>;

    /// Atomically sets the status if the move is legal. Returns whether it was applied.
    fn update_status(&self, id: &JobId, status: JobStatus) -> Result<bool>;

    /// Increments the named counter and returns the new value.
    fn find_and_increment(&self, lock: &str) -> Result<u64>;

    /// Sets the named counter back to zero.
    fn reset(&self, lock: &str) -> Result<()>;

    /// When the counter last went from zero to one, if it is held.
    fn lock_acquired_at(&self, lock: &str) -> Result<Option<DateTime<Utc>>>;

    /// Records the jobs submitted under a batch name, replacing any earlier batch of that name.
    fn save_batch(&self, name: &str, ids: &[JobId]) -> Result<()>;

    /// Jobs of a named batch in submission order.
    fn find_batch(&self, name: &str) -> Result<Option<Vec<JobId>>>;
}
