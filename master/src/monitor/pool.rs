use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use futures::future;
use futures_cpupool;
use futures_cpupool::CpuPool;

use common::JobId;
use monitor::{JobMonitor, MonitorOutcome};

const DRAIN_POLL_MS: u64 = 100;

// Decrements the active count when the monitor finishes, panics included.
struct ActiveMonitor(Arc<AtomicUsize>);

impl Drop for ActiveMonitor {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `MonitorPool` runs job monitors on a bounded `CpuPool`, one pool thread per monitor.
pub struct MonitorPool {
    cpu_pool: CpuPool,
    max_monitors: usize,
    active: Arc<AtomicUsize>,
}

impl MonitorPool {
    pub fn new(max_monitors: usize) -> Self {
        let max_monitors = if max_monitors == 0 { 1 } else { max_monitors };
        let cpu_pool = futures_cpupool::Builder::new()
            .pool_size(max_monitors)
            .name_prefix("monitor-")
            .create();

        MonitorPool {
            cpu_pool: cpu_pool,
            max_monitors: max_monitors,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_monitors(&self) -> usize {
        self.max_monitors
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn has_capacity(&self) -> bool {
        self.active() < self.max_monitors
    }

    fn spawn<F>(&self, job_id: JobId, work: F)
    where
        F: FnOnce() -> MonitorOutcome + Send + 'static,
    {
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = ActiveMonitor(Arc::clone(&self.active));

        let cpu_future = self.cpu_pool.spawn(future::lazy(move || {
            let _active = active;
            let outcome = work();
            debug!("Monitor of job {} finished: {:?}", job_id, outcome);
            Ok::<MonitorOutcome, ()>(outcome)
        }));
        cpu_future.forget();
    }

    pub fn launch(&self, monitor: JobMonitor) {
        let job_id = monitor.job_id();
        self.spawn(job_id, move || monitor.launch());
    }

    pub fn resume(&self, monitor: JobMonitor) {
        let job_id = monitor.job_id();
        self.spawn(job_id, move || monitor.resume());
    }

    /// Waits for every monitor to finish. Returns false if `timeout` ran out first.
    pub fn drain(&self, timeout: Option<Duration>) -> bool {
        let started = Instant::now();
        loop {
            let active = self.active();
            if active == 0 {
                return true;
            }
            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    warn!("{} monitors still running after drain timeout", active);
                    return false;
                }
            }
            thread::sleep(Duration::from_millis(DRAIN_POLL_MS));
        }
    }
}
