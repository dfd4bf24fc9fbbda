//! Container engine interface. One engine instance talks to exactly one host.

pub use self::docker::DockerCliEngine;

mod docker;
#[cfg(test)]
pub mod stub;

use serde_json::Value;

use errors::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HostInfo {
    pub total_cpus: u32,
    pub total_memory: u64,
}

/// Everything needed to create and start one job container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    /// Full `image:tag` reference.
    pub image: String,
    pub cmd: Vec<String>,
    pub nano_cpus: u64,
    pub memory_bytes: u64,
    /// `host:container:mode` bindings.
    pub volumes: Vec<String>,
    pub working_dir: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContainerInspection {
    pub id: String,
    pub state: String,
    pub memory_limit: u64,
    pub nano_cpus: u64,
    /// The engine's full inspection document.
    pub raw: Value,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub state: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

pub trait ContainerEngine: Send + Sync {
    fn host_info(&self) -> Result<HostInfo>;

    fn pull(&self, image: &str, tag: &str) -> Result<()>;

    /// Creates and starts a detached container, returning its id.
    fn run(&self, spec: &ContainerSpec) -> Result<String>;

    /// Fails with `ErrorKind::ContainerNotFound` when the host has no such container.
    fn inspect(&self, container_id: &str) -> Result<ContainerInspection>;

    fn logs(&self, container_id: &str, stream: LogStream) -> Result<Vec<u8>>;

    fn remove(&self, container_id: &str) -> Result<()>;

    /// Running containers, or every container when `all` is set.
    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;
}

/// True when the error says the container does not exist on the host.
pub fn is_container_not_found(err: &Error) -> bool {
    match *err.kind() {
        ErrorKind::ContainerNotFound(_) => true,
        _ => false,
    }
}
