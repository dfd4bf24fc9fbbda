/// Common module contains the shared data containers which are used throughout the
/// application.
/// Job: A user submitted unit of work, an application run against an input.
/// Host: A snapshot of one container engine host's capacity and scheduled load.
pub mod host;
pub mod job;

pub use self::host::HostCapacity;
pub use self::host::NANOS_PER_CPU;
pub use self::job::is_container_active;
pub use self::job::Job;
pub use self::job::JobId;
pub use self::job::JobSpec;
pub use self::job::JobStatus;
