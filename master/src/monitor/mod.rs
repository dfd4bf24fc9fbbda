//! Job monitors: one supervised task per active job, run on a bounded pool.

pub use self::job_monitor::{ContainerGuard, JobMonitor, MonitorOutcome, MonitorSettings};
pub use self::pool::MonitorPool;

mod job_monitor;
mod pool;
