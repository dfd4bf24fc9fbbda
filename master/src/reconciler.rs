use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono;
use chrono::prelude::*;
use uuid::Uuid;

use common::JobStatus;
use errors::*;
use scheduling::{Fleet, HostInventory};
use shutdown::Shutdown;
use store::{JobFilter, JobStore};
use util::output_error;

/// Name of the shared counter guarding reconciliation.
pub const RECONCILE_LOCK: &str = "sync";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileReport {
    /// Running records looked at.
    pub checked: usize,
    /// Records whose status was set from their container's state.
    pub updated: usize,
    /// Records marked exited because their container was nowhere to be found.
    pub missing: usize,
    /// Exited containers removed from the fleet.
    pub removed: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconcileOutcome {
    /// Another instance holds the lock. Nothing was touched.
    Skipped,
    Completed(ReconcileReport),
}

// Resets the lock counter when the run ends, whichever way it ends.
struct LockGuard<'a> {
    store: &'a JobStore,
    lock: &'a str,
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        if let Err(err) = self.store.reset(self.lock) {
            output_error(&err.chain_err(|| format!("Unable to release lock {}", self.lock)));
        }
    }
}

/// The `Reconciler` repairs drift between `running` job records and the containers actually
/// present on the fleet, and removes exited containers.
///
/// Runs are mutually exclusive across every master sharing the store. Exclusion is an
/// increment-and-compare on a shared counter: a run proceeds only if its increment returned 1,
/// and resets the counter to 0 when done. With a lease, a counter held longer than the lease is
/// presumed abandoned and reset, and the next run takes it.
pub struct Reconciler {
    store: Arc<JobStore>,
    fleet: Arc<Fleet>,
    lease: Option<chrono::Duration>,
}

impl Reconciler {
    pub fn new(store: Arc<JobStore>, fleet: Arc<Fleet>, lease: Option<Duration>) -> Self {
        Reconciler {
            store: store,
            fleet: fleet,
            lease: lease.and_then(|lease| chrono::Duration::from_std(lease).ok()),
        }
    }

    fn acquire(&self) -> Result<Option<LockGuard>> {
        let value = self.store.find_and_increment(RECONCILE_LOCK).chain_err(
            || "Unable to take the reconcile lock",
        )?;
        if value == 1 {
            return Ok(Some(LockGuard {
                store: &*self.store,
                lock: RECONCILE_LOCK,
            }));
        }

        if let Some(lease) = self.lease {
            if let Some(acquired_at) = self.store.lock_acquired_at(RECONCILE_LOCK)? {
                if Utc::now().signed_duration_since(acquired_at) > lease {
                    warn!(
                        "Reconcile lock held since {}, past its lease; resetting it",
                        acquired_at
                    );
                    self.store.reset(RECONCILE_LOCK)?;
                }
            }
        }
        Ok(None)
    }

    /// Runs one reconciliation if no other instance is running one.
    pub fn run(&self) -> Result<ReconcileOutcome> {
        let run_id = Uuid::new_v4();
        let _guard = match self.acquire()? {
            Some(guard) => guard,
            None => {
                info!("Reconcile run {} skipped, lock is held", run_id);
                return Ok(ReconcileOutcome::Skipped);
            }
        };

        info!("Reconcile run {} started", run_id);
        let report = self.reconcile()?;
        info!(
            "Reconcile run {} done: {} checked, {} updated, {} missing, {} containers removed",
            run_id,
            report.checked,
            report.updated,
            report.missing,
            report.removed
        );
        Ok(ReconcileOutcome::Completed(report))
    }

    fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        // Records before containers. A job that turns running after this query is not checked,
        // and one already running had its container created before the listing.
        let running = self.store
            .find(&JobFilter::with_status(JobStatus::Running))
            .chain_err(|| "Unable to get running jobs")?;

        let inventory = self.fleet.inventory();
        let unreachable: HashSet<&str> = inventory
            .iter()
            .filter(|host| host.containers.is_none())
            .map(|host| host.host.as_str())
            .collect();

        // Containers of jobs that were running when the pass began are left for their monitors
        // to collect and remove.
        let mut owned = HashSet::new();

        for job in &running {
            report.checked += 1;
            let found = job.container_id
                .as_ref()
                .and_then(|container_id| find_container(&inventory, container_id));

            let status = match found {
                Some(state) => {
                    debug!("Found container of job {}: {}", job.id, state);
                    if let Some(ref container_id) = job.container_id {
                        owned.insert(container_id.clone());
                    }
                    JobStatus::from_container_state(&state)
                }
                None => {
                    let host_down = job.host
                        .as_ref()
                        .map(|host| unreachable.contains(host.as_str()))
                        .unwrap_or(false);
                    if host_down {
                        warn!("Host of job {} is unreachable, leaving it as is", job.id);
                        continue;
                    }
                    warn!("Container not found for job {}, marking it exited", job.id);
                    report.missing += 1;
                    JobStatus::Exited
                }
            };

            if status != job.status && self.store.update_status(&job.id, status)? {
                report.updated += 1;
            }
        }

        for host in &inventory {
            let containers = match host.containers {
                Some(ref containers) => containers,
                None => continue,
            };
            let engine = match self.fleet.engine(&host.host) {
                Some(engine) => engine,
                None => continue,
            };

            for container in containers {
                if container.state != "exited" || owned.contains(&container.id) ||
                    self.fleet.is_protected(&container.name)
                {
                    continue;
                }
                match engine.remove(&container.id) {
                    Ok(()) => {
                        info!("Removed exited container {} on {}", container.id, host.host);
                        report.removed += 1;
                    }
                    Err(err) => {
                        output_error(&err.chain_err(|| {
                            format!("Unable to remove container {} on {}", container.id, host.host)
                        }))
                    }
                }
            }
        }

        Ok(report)
    }
}

fn find_container(inventory: &[HostInventory], container_id: &str) -> Option<String> {
    inventory
        .iter()
        .filter_map(|host| host.containers.as_ref())
        .flat_map(|containers| containers.iter())
        .find(|container| container.id == container_id)
        .map(|container| container.state.clone())
}

/// Runs the reconciler every `interval` on a new thread until shutdown.
pub fn run_reconcile_loop(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    shutdown: Shutdown,
) -> thread::JoinHandle<()> {
    thread::spawn(move || while shutdown.sleep(interval) {
        if let Err(err) = reconciler.run() {
            output_error(&err.chain_err(|| "Error running reconciler"));
        }
    })
}
