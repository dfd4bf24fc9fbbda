use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rand::{thread_rng, Rng};

use apps::AppRegistry;
use common::{Job, JobId, JobStatus};
use engine::is_container_not_found;
use errors::*;
use monitor::{JobMonitor, MonitorPool, MonitorSettings};
use scheduling::{select_host, Allocation, Fleet};
use shutdown::Shutdown;
use store::{JobFilter, JobStore};
use util::output_error;

/// What one scheduling pass did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CycleReport {
    /// Claimed and handed to a monitor.
    pub placed: usize,
    /// Left unscheduled for a later pass: no host fits, or the monitor ceiling was reached.
    pub pending: usize,
    /// Moved straight to `error`, e.g. because their app is not registered.
    pub failed: usize,
}

/// The `Scheduler` places unscheduled jobs on the fleet and starts their monitors.
///
/// Placement decisions are only ever made by one scheduling pass at a time. Within a pass the
/// fleet snapshot is decremented as jobs are placed, so one pass never over-subscribes a host.
pub struct Scheduler {
    store: Arc<JobStore>,
    registry: Arc<AppRegistry>,
    fleet: Arc<Fleet>,
    monitors: Arc<MonitorPool>,
    settings: MonitorSettings,
    shutdown: Shutdown,
    shuffle_hosts: bool,
    // Interrupted jobs waiting for a monitor slot, oldest first.
    deferred_resumes: Mutex<Vec<JobId>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        registry: Arc<AppRegistry>,
        fleet: Arc<Fleet>,
        monitors: Arc<MonitorPool>,
        settings: MonitorSettings,
        shutdown: Shutdown,
    ) -> Self {
        Scheduler {
            store: store,
            registry: registry,
            fleet: fleet,
            monitors: monitors,
            settings: settings,
            shutdown: shutdown,
            shuffle_hosts: true,
            deferred_resumes: Mutex::new(Vec::new()),
        }
    }

    /// Whether host order is randomised every pass to spread load. On by default.
    pub fn set_shuffle_hosts(&mut self, shuffle_hosts: bool) {
        self.shuffle_hosts = shuffle_hosts;
    }

    fn fail_job(&self, job: &mut Job, message: String) -> Result<()> {
        warn!("Failing job {}: {}", job.id, message);
        job.fail(message);
        self.store.replace(&job.id, job).chain_err(|| {
            format!("Unable to save failed job {}", job.id)
        })
    }

    /// Runs one scheduling pass over every unscheduled job, in arrival order.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        if self.shutdown.is_triggered() {
            return Ok(report);
        }
        self.resume_deferred()?;

        let jobs = self.store
            .find(&JobFilter::with_status(JobStatus::Unscheduled))
            .chain_err(|| "Unable to get unscheduled jobs")?;
        if jobs.is_empty() {
            return Ok(report);
        }

        let mut snapshot = self.fleet.snapshot();
        if snapshot.is_empty() {
            warn!("No reachable hosts, {} jobs stay unscheduled", jobs.len());
        }
        if self.shuffle_hosts {
            thread_rng().shuffle(&mut snapshot);
        }

        for mut job in jobs {
            if self.shutdown.is_triggered() {
                debug!("Shutting down, {} stays unscheduled", job);
                report.pending += 1;
                continue;
            }

            let app = match self.registry.resolve(&job.app) {
                Ok(app) => app,
                Err(err) => {
                    if let Err(err) = self.fail_job(&mut job, err.to_string()) {
                        output_error(&err);
                        continue;
                    }
                    report.failed += 1;
                    continue;
                }
            };

            if !self.monitors.has_capacity() {
                debug!(
                    "Monitor ceiling of {} reached, {} stays unscheduled",
                    self.monitors.max_monitors(),
                    job
                );
                report.pending += 1;
                continue;
            }

            let need = app.resource_need();
            let index = match select_host(&need, &snapshot) {
                Some(index) => index,
                None => {
                    debug!("No host has room for {} ({:?})", job, need);
                    report.pending += 1;
                    continue;
                }
            };

            let host = snapshot[index].host.clone();
            let engine = match self.fleet.engine(&host) {
                Some(engine) => engine,
                None => {
                    warn!("Host {} is not part of the fleet, {} stays unscheduled", host, job);
                    report.pending += 1;
                    continue;
                }
            };
            match self.store.claim(&job.id, &host) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Job {} was claimed elsewhere", job.id);
                    continue;
                }
                Err(err) => {
                    output_error(&err.chain_err(|| format!("Unable to claim job {}", job.id)));
                    continue;
                }
            }

            let allocation: Allocation = need.on_host(&snapshot[index]);
            snapshot[index].reserve(allocation.nano_cpus, allocation.memory_bytes);

            info!("Placing {} on {}", job, host);
            self.monitors.launch(JobMonitor::new(
                job.id,
                app,
                engine,
                Arc::clone(&self.store),
                self.settings.clone(),
                allocation,
                self.shutdown.clone(),
            ));
            report.placed += 1;
        }

        Ok(report)
    }

    fn resume_job(&self, job: &Job) -> Result<bool> {
        let host = match job.host.clone() {
            Some(host) => host,
            None => return Ok(false),
        };
        let container_id = match job.container_id.clone() {
            Some(container_id) => container_id,
            None => return Ok(false),
        };
        let engine = match self.fleet.engine(&host) {
            Some(engine) => engine,
            None => return Ok(false),
        };

        // The container keeps the limits it was started with.
        let allocation = match engine.inspect(&container_id) {
            Ok(inspection) => {
                Allocation {
                    nano_cpus: inspection.nano_cpus,
                    memory_bytes: inspection.memory_limit,
                }
            }
            Err(ref err) if is_container_not_found(err) => return Ok(false),
            Err(err) => return Err(err),
        };

        let app = self.registry.resolve(&job.app)?;
        info!("Resuming monitor of {} on {}", job, host);
        self.monitors.resume(JobMonitor::new(
            job.id,
            app,
            engine,
            Arc::clone(&self.store),
            self.settings.clone(),
            allocation,
            self.shutdown.clone(),
        ));
        Ok(true)
    }

    /// Restarts supervision of jobs left `init` or `running` by a previous master.
    ///
    /// Jobs whose container still exists get a new monitor. Running jobs without one are left
    /// to the reconciler, init jobs without one are failed.
    pub fn resume_interrupted_jobs(&self) -> Result<usize> {
        let mut jobs = self.store
            .find(&JobFilter::with_status(JobStatus::Running))
            .chain_err(|| "Unable to get running jobs")?;
        jobs.extend(
            self.store
                .find(&JobFilter::with_status(JobStatus::Init))
                .chain_err(|| "Unable to get initialising jobs")?,
        );

        let mut resumed = 0;
        let mut deferred = Vec::new();
        for mut job in jobs {
            if !self.monitors.has_capacity() && job.container_id.is_some() {
                deferred.push(job.id);
                continue;
            }
            match self.resume_job(&job) {
                Ok(true) => resumed += 1,
                Ok(false) => {
                    if job.status == JobStatus::Init {
                        let message = "Master stopped before the job's container was started";
                        if let Err(err) = self.fail_job(&mut job, message.to_owned()) {
                            output_error(&err);
                        }
                    }
                }
                Err(err) => {
                    output_error(&err.chain_err(|| format!("Unable to resume job {}", job.id)));
                }
            }
        }

        if resumed > 0 {
            info!("Resumed {} interrupted jobs", resumed);
        }
        if !deferred.is_empty() {
            info!(
                "Monitor ceiling of {} reached, {} interrupted jobs wait for a slot",
                self.monitors.max_monitors(),
                deferred.len()
            );
            self.deferred_resumes()?.extend(deferred);
        }
        Ok(resumed)
    }

    fn deferred_resumes(&self) -> Result<MutexGuard<Vec<JobId>>> {
        self.deferred_resumes.lock().map_err(
            |_| "Deferred resumes unavailable".into(),
        )
    }

    /// Number of interrupted jobs still waiting for a monitor slot.
    pub fn deferred_count(&self) -> Result<usize> {
        Ok(self.deferred_resumes()?.len())
    }

    // Resumes waiting interrupted jobs while monitor slots are free. They go before new jobs.
    fn resume_deferred(&self) -> Result<()> {
        let mut deferred = self.deferred_resumes()?;
        while !deferred.is_empty() && self.monitors.has_capacity() {
            let id = deferred.remove(0);
            let job = match self.store.find_one(&id) {
                Ok(Some(ref job)) if !job.status.is_terminal() => job.clone(),
                Ok(_) => continue,
                Err(err) => {
                    output_error(&err.chain_err(|| format!("Unable to load job {}", id)));
                    continue;
                }
            };
            match self.resume_job(&job) {
                Ok(true) => {}
                Ok(false) => debug!("Container of job {} is gone, leaving it to the reconciler", id),
                Err(err) => {
                    output_error(&err.chain_err(|| format!("Unable to resume job {}", id)));
                }
            }
        }
        Ok(())
    }
}

/// Runs scheduling passes every `interval` on a new thread until shutdown.
pub fn run_scheduling_loop(
    scheduler: Arc<Scheduler>,
    interval: Duration,
    shutdown: Shutdown,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        if shutdown.is_triggered() {
            break;
        }

        match scheduler.run_cycle() {
            Ok(report) => {
                if report.placed > 0 || report.failed > 0 {
                    info!(
                        "Scheduling pass: {} placed, {} pending, {} failed",
                        report.placed,
                        report.pending,
                        report.failed
                    );
                } else if report.pending > 0 {
                    debug!("Scheduling pass: {} pending", report.pending);
                }
            }
            Err(err) => output_error(&err.chain_err(|| "Error running scheduling pass")),
        }

        if !shutdown.sleep(interval) {
            break;
        }
    })
}
