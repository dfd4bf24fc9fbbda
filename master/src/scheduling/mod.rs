//! Placement and the scheduling loop.

pub use self::fleet::{Fleet, FleetHost, HostInventory};
pub use self::placement::{select_host, Allocation, ResourceNeed};
pub use self::scheduler::{run_scheduling_loop, CycleReport, Scheduler};

mod fleet;
mod placement;
mod scheduler;
