use common::{HostCapacity, NANOS_PER_CPU};

/// `ResourceNeed` is what an application asks for. `None` on either axis means the whole host.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResourceNeed {
    pub threads: Option<u32>,
    pub memory_bytes: Option<u64>,
}

/// `Allocation` is a `ResourceNeed` resolved against a concrete host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Allocation {
    pub nano_cpus: u64,
    pub memory_bytes: u64,
}

impl ResourceNeed {
    /// Resolves the need on a host. `t` threads on an `N` core host is `t/N` of its CPU.
    pub fn on_host(&self, host: &HostCapacity) -> Allocation {
        let nano_cpus = match self.threads {
            Some(threads) => u64::from(threads) * NANOS_PER_CPU,
            None => host.total_nano_cpus(),
        };
        let memory_bytes = match self.memory_bytes {
            Some(bytes) => bytes,
            None => host.total_memory,
        };

        Allocation {
            nano_cpus: nano_cpus,
            memory_bytes: memory_bytes,
        }
    }

    /// Whether the host has at least the needed headroom on both axes. The boundary is inclusive.
    pub fn fits(&self, host: &HostCapacity) -> bool {
        let allocation = self.on_host(host);
        host.memory_headroom() >= allocation.memory_bytes &&
            host.cpu_headroom() >= allocation.nano_cpus
    }
}

/// First-fit placement over the snapshot, in the order given.
///
/// Returns the index of the first host that fits, or `None` when no host does. A miss is not
/// an error, the job is simply retried on a later cycle.
pub fn select_host(need: &ResourceNeed, hosts: &[HostCapacity]) -> Option<usize> {
    hosts.iter().position(|host| need.fits(host))
}
