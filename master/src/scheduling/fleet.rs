use std::sync::Arc;

use common::HostCapacity;
use engine::{is_container_not_found, ContainerEngine, ContainerSummary, DockerCliEngine};
use errors::*;
use util::output_error;

/// One configured container engine host.
#[derive(Clone)]
pub struct FleetHost {
    pub id: String,
    pub engine: Arc<ContainerEngine>,
}

/// Containers of one host as seen by the reconciler. `containers` is `None` when the host could
/// not be listed.
#[derive(Clone, Debug)]
pub struct HostInventory {
    pub host: String,
    pub containers: Option<Vec<ContainerSummary>>,
}

/// `Fleet` is the set of hosts built once at startup and shared by reference afterwards.
pub struct Fleet {
    hosts: Vec<FleetHost>,
    protected: Vec<String>,
}

impl Fleet {
    pub fn new(hosts: Vec<FleetHost>, protected: Vec<String>) -> Self {
        Fleet {
            hosts: hosts,
            protected: protected,
        }
    }

    /// A fleet of Docker daemons reached through the `docker` command line.
    pub fn from_endpoints(endpoints: &[String], protected: Vec<String>) -> Self {
        let hosts = endpoints
            .iter()
            .map(|endpoint| {
                FleetHost {
                    id: endpoint.clone(),
                    engine: Arc::new(DockerCliEngine::new(endpoint.as_str())),
                }
            })
            .collect();
        Fleet::new(hosts, protected)
    }

    pub fn hosts(&self) -> &[FleetHost] {
        &self.hosts
    }

    pub fn engine(&self, host: &str) -> Option<Arc<ContainerEngine>> {
        self.hosts.iter().find(|h| h.id == host).map(
            |h| Arc::clone(&h.engine),
        )
    }

    /// Protected containers (monitoring agents and the like) are neither accounted nor removed.
    pub fn is_protected(&self, container_name: &str) -> bool {
        let name = container_name.trim_left_matches('/');
        self.protected.iter().any(|protected| protected == name)
    }

    fn host_capacity(&self, host: &FleetHost) -> Result<HostCapacity> {
        let info = host.engine.host_info().chain_err(
            || "Unable to get host info",
        )?;
        let mut capacity = HostCapacity::new(host.id.as_str(), info.total_cpus, info.total_memory);

        let containers = host.engine.list_containers(false).chain_err(
            || "Unable to list containers",
        )?;
        for container in containers {
            if self.is_protected(&container.name) {
                continue;
            }
            let inspection = match host.engine.inspect(&container.id) {
                Ok(inspection) => inspection,
                // Gone between the listing and the inspection.
                Err(ref err) if is_container_not_found(err) => continue,
                Err(err) => {
                    return Err(err).chain_err(|| {
                        format!("Unable to inspect container {}", container.id)
                    })
                }
            };
            capacity.reserve(inspection.nano_cpus, inspection.memory_limit);
        }

        Ok(capacity)
    }

    /// Capacity and scheduled load of every reachable host, in configuration order.
    ///
    /// Scheduled load is the sum of the limits of the running containers, not their live usage.
    /// Hosts that fail to answer are logged and left out of the snapshot.
    pub fn snapshot(&self) -> Vec<HostCapacity> {
        let mut snapshot = Vec::new();
        for host in &self.hosts {
            match self.host_capacity(host) {
                Ok(capacity) => snapshot.push(capacity),
                Err(err) => {
                    warn!("Leaving host {} out of this cycle", host.id);
                    output_error(&err);
                }
            }
        }
        snapshot
    }

    /// Every container, running or not, of every host.
    pub fn inventory(&self) -> Vec<HostInventory> {
        self.hosts
            .iter()
            .map(|host| {
                let containers = match host.engine.list_containers(true) {
                    Ok(containers) => Some(containers),
                    Err(err) => {
                        warn!("Unable to list containers on {}", host.id);
                        output_error(&err);
                        None
                    }
                };
                HostInventory {
                    host: host.id.clone(),
                    containers: containers,
                }
            })
            .collect()
    }
}
