use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::prelude::*;
use serde_json;

use common::{Job, JobId, JobSpec, JobStatus};
use errors::*;
use store::{JobFilter, JobStore};
use util::state::{SimpleStateHandling, StateHandling};

const STORE_UNAVAILABLE: &str = "Job store unavailable";

struct LockState {
    value: u64,
    acquired_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct StoreState {
    // Insertion order is the scheduling order.
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    locks: HashMap<String, LockState>,
    batches: BTreeMap<String, Vec<JobId>>,
}

impl StoreState {
    fn job_mut(&mut self, id: &JobId) -> Result<&mut Job> {
        match self.index.get(id) {
            Some(&position) => Ok(&mut self.jobs[position]),
            None => Err(ErrorKind::JobNotFound(id.to_hex()).into()),
        }
    }
}

/// `MemoryJobStore` is an in-process `JobStore`. It is made durable by dumping it with the
/// master's state handler.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<StoreState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Default::default()
    }

    fn state(&self) -> Result<MutexGuard<StoreState>> {
        self.state.lock().map_err(|_| STORE_UNAVAILABLE.into())
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, spec: JobSpec) -> Result<JobId> {
        let mut state = self.state()?;
        let mut id = JobId::generate();
        while state.index.contains_key(&id) {
            id = JobId::generate();
        }

        let position = state.jobs.len();
        state.jobs.push(Job::new(id, spec));
        state.index.insert(id, position);
        Ok(id)
    }

    fn find(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let state = self.state()?;
        Ok(
            state
                .jobs
                .iter()
                .filter(|job| filter.matches(job))
                .cloned()
                .collect(),
        )
    }

    fn find_one(&self, id: &JobId) -> Result<Option<Job>> {
        let state = self.state()?;
        Ok(state.index.get(id).map(|&position| state.jobs[position].clone()))
    }

    fn replace(&self, id: &JobId, job: &Job) -> Result<()> {
        let mut state = self.state()?;
        let stored = state.job_mut(id)?;

        let status = if stored.status == job.status || stored.status.can_transition_to(job.status) {
            job.status
        } else {
            warn!(
                "Keeping status {} of job {}, ignoring write of {}",
                stored.status,
                id,
                job.status
            );
            stored.status
        };

        *stored = job.clone();
        stored.id = *id;
        stored.status = status;
        Ok(())
    }

    fn count(&self, filter: &JobFilter) -> Result<usize> {
        let state = self.state()?;
        Ok(state.jobs.iter().filter(|job| filter.matches(job)).count())
    }

    fn distinct_statuses(&self) -> Result<Vec<JobStatus>> {
        let state = self.state()?;
        let statuses: BTreeSet<JobStatus> = state.jobs.iter().map(|job| job.status).collect();
        Ok(statuses.into_iter().collect())
    }

    fn claim(&self, id: &JobId, host: &str) -> Result<bool> {
        let mut state = self.state()?;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Unscheduled {
            return Ok(false);
        }

        job.status = JobStatus::Init;
        job.host = Some(host.to_owned());
        Ok(true)
    }

    fn unclaim(&self, id: &JobId) -> Result<bool> {
        let mut state = self.state()?;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Init || job.container_id.is_some() {
            return Ok(false);
        }

        job.status = JobStatus::Unscheduled;
        job.host = None;
        Ok(true)
    }

    fn update_status(&self, id: &JobId, status: JobStatus) -> Result<bool> {
        let mut state = self.state()?;
        let job = state.job_mut(id)?;
        if job.status == status {
            return Ok(true);
        }
        if !job.status.can_transition_to(status) {
            return Ok(false);
        }

        job.status = status;
        Ok(true)
    }

    fn find_and_increment(&self, lock: &str) -> Result<u64> {
        let mut state = self.state()?;
        let entry = state.locks.entry(lock.to_owned()).or_insert(LockState {
            value: 0,
            acquired_at: None,
        });

        entry.value += 1;
        if entry.value == 1 {
            entry.acquired_at = Some(Utc::now());
        }
        Ok(entry.value)
    }

    fn reset(&self, lock: &str) -> Result<()> {
        let mut state = self.state()?;
        state.locks.insert(
            lock.to_owned(),
            LockState {
                value: 0,
                acquired_at: None,
            },
        );
        Ok(())
    }

    fn lock_acquired_at(&self, lock: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.state()?;
        Ok(state.locks.get(lock).and_then(|lock| lock.acquired_at))
    }

    fn save_batch(&self, name: &str, ids: &[JobId]) -> Result<()> {
        let mut state = self.state()?;
        state.batches.insert(name.to_owned(), ids.to_vec());
        Ok(())
    }

    fn find_batch(&self, name: &str) -> Result<Option<Vec<JobId>>> {
        let state = self.state()?;
        Ok(state.batches.get(name).cloned())
    }
}

impl SimpleStateHandling<Error> for MemoryJobStore {
    // Locks are deliberately left out: a restarted master starts with every lock released.
    fn dump_state(&self) -> Result<serde_json::Value> {
        let state = self.state()?;
        let mut jobs = Vec::new();
        for job in &state.jobs {
            jobs.push(job.dump_state().chain_err(|| format!("Unable to dump job {}", job.id))?);
        }

        Ok(json!({
            "jobs": jobs,
            "batches": state.batches,
        }))
    }

    fn load_state(&self, data: serde_json::Value) -> Result<()> {
        let jobs_data = match data["jobs"] {
            serde_json::Value::Array(ref jobs) => jobs.clone(),
            _ => return Err("Unable to retrieve jobs from JSON".into()),
        };

        let mut jobs = Vec::new();
        let mut index = HashMap::new();
        for job_data in jobs_data {
            let job = Job::new_from_json(job_data).chain_err(|| "Unable to load job")?;
            if index.contains_key(&job.id) {
                return Err(format!("Job {} appears twice in the state", job.id).into());
            }
            index.insert(job.id, jobs.len());
            jobs.push(job);
        }

        // Dumps written before batches were recorded have none.
        let batches: BTreeMap<String, Vec<JobId>> = match data.get("batches") {
            Some(batches) if !batches.is_null() => {
                serde_json::from_value(batches.clone()).chain_err(
                    || "Unable to load batches",
                )?
            }
            _ => BTreeMap::new(),
        };

        let mut state = self.state()?;
        info!("Loaded {} jobs and {} batches from state", jobs.len(), batches.len());
        state.jobs = jobs;
        state.index = index;
        state.batches = batches;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn spec(app: &str) -> JobSpec {
        JobSpec {
            app: app.to_owned(),
            input: Some("/bin/ls".to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_find_in_order() {
        let store = MemoryJobStore::new();
        let ids: Vec<JobId> = (0..5).map(|_| store.insert(spec("Test")).unwrap()).collect();

        let found: Vec<JobId> = store
            .find(&JobFilter::with_status(JobStatus::Unscheduled))
            .unwrap()
            .iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(ids, found);

        let job = store.find_one(&ids[2]).unwrap().unwrap();
        assert_eq!("Test", job.app);
        assert_eq!(Some("/bin/ls".to_owned()), job.input);
        assert!(store.find_one(&JobId::generate()).unwrap().is_none());
    }

    #[test]
    fn test_claim_only_once() {
        let store = MemoryJobStore::new();
        let id = store.insert(spec("Test")).unwrap();

        assert!(store.claim(&id, "host-a").unwrap());
        assert!(!store.claim(&id, "host-b").unwrap());

        let job = store.find_one(&id).unwrap().unwrap();
        assert_eq!(JobStatus::Init, job.status);
        assert_eq!(Some("host-a".to_owned()), job.host);
        assert_eq!(0, store.count(&JobFilter::with_status(JobStatus::Unscheduled)).unwrap());
    }

    #[test]
    fn test_unclaim_only_before_start() {
        let store = MemoryJobStore::new();
        let id = store.insert(spec("Test")).unwrap();
        assert!(!store.unclaim(&id).unwrap());

        store.claim(&id, "host-a").unwrap();
        assert!(store.unclaim(&id).unwrap());
        let job = store.find_one(&id).unwrap().unwrap();
        assert_eq!(JobStatus::Unscheduled, job.status);
        assert_eq!(None, job.host);

        store.claim(&id, "host-b").unwrap();
        store.update_status(&id, JobStatus::Running).unwrap();
        assert!(!store.unclaim(&id).unwrap());
        assert_eq!(JobStatus::Running, store.find_one(&id).unwrap().unwrap().status);
    }

    #[test]
    fn test_update_status_is_monotonic() {
        let store = MemoryJobStore::new();
        let id = store.insert(spec("Test")).unwrap();

        assert!(store.update_status(&id, JobStatus::Running).unwrap());
        assert!(!store.update_status(&id, JobStatus::Init).unwrap());
        assert!(store.update_status(&id, JobStatus::Exited).unwrap());
        assert!(!store.update_status(&id, JobStatus::Error).unwrap());
        assert!(!store.update_status(&id, JobStatus::Running).unwrap());
        assert_eq!(JobStatus::Exited, store.find_one(&id).unwrap().unwrap().status);
    }

    #[test]
    fn test_replace_keeps_terminal_status() {
        let store = MemoryJobStore::new();
        let id = store.insert(spec("Test")).unwrap();
        let mut stale = store.find_one(&id).unwrap().unwrap();
        stale.status = JobStatus::Running;
        store.replace(&id, &stale).unwrap();

        store.update_status(&id, JobStatus::Exited).unwrap();

        stale.stdout = vec!["done".to_owned()];
        store.replace(&id, &stale).unwrap();

        let job = store.find_one(&id).unwrap().unwrap();
        assert_eq!(JobStatus::Exited, job.status);
        assert_eq!(vec!["done".to_owned()], job.stdout);
    }

    #[test]
    fn test_replace_unknown_job() {
        let store = MemoryJobStore::new();
        let job = Job::new(JobId::generate(), spec("Test"));
        let err = store.replace(&job.id, &job).unwrap_err();
        match *err.kind() {
            ErrorKind::JobNotFound(_) => {}
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_distinct_statuses_and_count() {
        let store = MemoryJobStore::new();
        let a = store.insert(spec("Test")).unwrap();
        store.insert(spec("Test")).unwrap();
        store.insert(spec("Rabin2")).unwrap();
        store.update_status(&a, JobStatus::Error).unwrap();

        assert_eq!(
            vec![JobStatus::Unscheduled, JobStatus::Error],
            store.distinct_statuses().unwrap()
        );
        let filter = JobFilter {
            app: Some("Test".to_owned()),
            ..Default::default()
        };
        assert_eq!(2, store.count(&filter).unwrap());
    }

    #[test]
    fn test_lock_counter() {
        let store = MemoryJobStore::new();
        assert!(store.lock_acquired_at("reconcile").unwrap().is_none());

        assert_eq!(1, store.find_and_increment("reconcile").unwrap());
        assert!(store.lock_acquired_at("reconcile").unwrap().is_some());
        assert_eq!(2, store.find_and_increment("reconcile").unwrap());

        store.reset("reconcile").unwrap();
        assert!(store.lock_acquired_at("reconcile").unwrap().is_none());
        assert_eq!(1, store.find_and_increment("reconcile").unwrap());
    }

    #[test]
    fn test_concurrent_increments_admit_one() {
        let store = Arc::new(MemoryJobStore::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let winners = Arc::clone(&winners);
                thread::spawn(move || if store.find_and_increment("reconcile").unwrap() == 1 {
                    winners.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(1, winners.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dump_and_load_state() {
        let store = MemoryJobStore::new();
        let first = store.insert(spec("Test")).unwrap();
        let second = store.insert(spec("Rabin2")).unwrap();
        store.claim(&second, "host-a").unwrap();
        store.find_and_increment("reconcile").unwrap();
        store.save_batch("nightly", &[second, first]).unwrap();

        let data = store.dump_state().unwrap();

        let loaded = MemoryJobStore::new();
        loaded.load_state(data).unwrap();
        let ids: Vec<JobId> = loaded
            .find(&JobFilter::all())
            .unwrap()
            .iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(vec![first, second], ids);
        assert_eq!(JobStatus::Init, loaded.find_one(&second).unwrap().unwrap().status);
        assert_eq!(1, loaded.find_and_increment("reconcile").unwrap());
        assert_eq!(Some(vec![second, first]), loaded.find_batch("nightly").unwrap());
    }

    #[test]
    fn test_load_state_without_batches() {
        let store = MemoryJobStore::new();
        store.save_batch("old", &[]).unwrap();
        store.load_state(json!({"jobs": []})).unwrap();
        assert_eq!(None, store.find_batch("old").unwrap());
    }

    #[test]
    fn test_save_batch_replaces() {
        let store = MemoryJobStore::new();
        let a = store.insert(spec("Test")).unwrap();
        let b = store.insert(spec("Test")).unwrap();
        assert_eq!(None, store.find_batch("weekly").unwrap());

        store.save_batch("weekly", &[a]).unwrap();
        store.save_batch("weekly", &[b]).unwrap();
        assert_eq!(Some(vec![b]), store.find_batch("weekly").unwrap());
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let store = MemoryJobStore::new();
        assert!(store.load_state(json!({"tasks": []})).is_err());
    }
}
