/// One CPU expressed in nanocpus, the unit container engines use for CPU limits.
pub const NANOS_PER_CPU: u64 = 1_000_000_000;

/// `HostCapacity` is the capacity of a single fleet host together with what is currently
/// scheduled on it. It is recomputed every scheduling cycle and never persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostCapacity {
    pub host: String,
    pub total_cpus: u32,
    pub total_memory: u64,

    pub scheduled_nano_cpus: u64,
    pub scheduled_memory: u64,
}

impl HostCapacity {
    pub fn new<S: Into<String>>(host: S, total_cpus: u32, total_memory: u64) -> Self {
        HostCapacity {
            host: host.into(),
            total_cpus: total_cpus,
            total_memory: total_memory,

            scheduled_nano_cpus: 0,
            scheduled_memory: 0,
        }
    }

    pub fn total_nano_cpus(&self) -> u64 {
        u64::from(self.total_cpus) * NANOS_PER_CPU
    }

    pub fn cpu_headroom(&self) -> u64 {
        self.total_nano_cpus().saturating_sub(self.scheduled_nano_cpus)
    }

    pub fn memory_headroom(&self) -> u64 {
        self.total_memory.saturating_sub(self.scheduled_memory)
    }

    pub fn reserve(&mut self, nano_cpus: u64, memory: u64) {
        self.scheduled_nano_cpus = self.scheduled_nano_cpus.saturating_add(nano_cpus);
        self.scheduled_memory = self.scheduled_memory.saturating_add(memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headroom() {
        let mut host = HostCapacity::new("10.0.0.1:2376", 4, 16_000_000_000);
        assert_eq!(4 * NANOS_PER_CPU, host.cpu_headroom());
        assert_eq!(16_000_000_000, host.memory_headroom());

        host.reserve(NANOS_PER_CPU, 4_000_000_000);
        assert_eq!(3 * NANOS_PER_CPU, host.cpu_headroom());
        assert_eq!(12_000_000_000, host.memory_headroom());
    }

    #[test]
    fn test_headroom_never_negative() {
        let mut host = HostCapacity::new("10.0.0.1:2376", 1, 1_000);
        host.reserve(2 * NANOS_PER_CPU, 5_000);
        assert_eq!(0, host.cpu_headroom());
        assert_eq!(0, host.memory_headroom());
    }
}
