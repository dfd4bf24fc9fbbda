use std::collections::VecDeque;
use std::sync::Mutex;

use engine::{ContainerEngine, ContainerInspection, ContainerSpec, ContainerSummary, HostInfo,
             LogStream};
use errors::*;

struct StubContainer {
    summary: ContainerSummary,
    nano_cpus: u64,
    memory: u64,
    // States reported by the next inspections, one per call.
    script: VecDeque<String>,
}

#[derive(Default)]
struct StubState {
    containers: Vec<StubContainer>,
    removed: Vec<String>,
    runs: Vec<ContainerSpec>,
    script: Vec<String>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    fail_logs: bool,
    inspections: usize,
}

/// In-memory `ContainerEngine` for tests. Containers created with `run` report the scripted
/// states on successive inspections and then stay in the last one.
pub struct StubEngine {
    info: Option<HostInfo>,
    state: Mutex<StubState>,
}

impl StubEngine {
    pub fn new(cpus: u32, memory: u64) -> Self {
        StubEngine {
            info: Some(HostInfo {
                total_cpus: cpus,
                total_memory: memory,
            }),
            state: Mutex::new(Default::default()),
        }
    }

    pub fn unreachable() -> Self {
        StubEngine {
            info: None,
            state: Mutex::new(Default::default()),
        }
    }

    pub fn with_container(self, id: &str, name: &str, state: &str, nano_cpus: u64, memory: u64) -> Self {
        self.state.lock().unwrap().containers.push(StubContainer {
            summary: ContainerSummary {
                id: id.to_owned(),
                name: name.to_owned(),
                state: state.to_owned(),
            },
            nano_cpus: nano_cpus,
            memory: memory,
            script: VecDeque::new(),
        });
        self
    }

    pub fn with_script(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().script = states.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn with_logs(self, stdout: &str, stderr: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.stdout = stdout.as_bytes().to_vec();
            state.stderr = stderr.as_bytes().to_vec();
        }
        self
    }

    pub fn with_failing_logs(self) -> Self {
        self.state.lock().unwrap().fail_logs = true;
        self
    }

    /// Makes a container disappear without going through `remove`.
    pub fn vanish(&self, container_id: &str) {
        self.state.lock().unwrap().containers.retain(
            |c| c.summary.id != container_id,
        );
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn runs(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn container_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.containers.iter().map(|c| c.summary.id.clone()).collect()
    }

    pub fn inspections(&self) -> usize {
        self.state.lock().unwrap().inspections
    }
}

impl ContainerEngine for StubEngine {
    fn host_info(&self) -> Result<HostInfo> {
        self.info.chain_err(|| "host unreachable")
    }

    fn pull(&self, _image: &str, _tag: &str) -> Result<()> {
        Ok(())
    }

    fn run(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = format!("container-{}", state.runs.len() + 1);
        let mut script: VecDeque<String> = state.script.iter().cloned().collect();
        let first = script.pop_front().unwrap_or_else(|| "running".to_owned());

        state.runs.push(spec.clone());
        state.containers.push(StubContainer {
            summary: ContainerSummary {
                id: id.clone(),
                name: spec.name.clone(),
                state: first,
            },
            nano_cpus: spec.nano_cpus,
            memory: spec.memory_bytes,
            script: script,
        });
        Ok(id)
    }

    fn inspect(&self, container_id: &str) -> Result<ContainerInspection> {
        let mut state = self.state.lock().unwrap();
        state.inspections += 1;
        let container = match state.containers.iter_mut().find(
            |c| c.summary.id == container_id,
        ) {
            Some(container) => container,
            None => return Err(ErrorKind::ContainerNotFound(container_id.to_owned()).into()),
        };
        if let Some(next) = container.script.pop_front() {
            container.summary.state = next;
        }

        Ok(ContainerInspection {
            id: container.summary.id.clone(),
            state: container.summary.state.clone(),
            memory_limit: container.memory,
            nano_cpus: container.nano_cpus,
            raw: json!({
                "Id": container.summary.id,
                "State": {"Status": container.summary.state, "ExitCode": 0},
            }),
        })
    }

    fn logs(&self, container_id: &str, stream: LogStream) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        if state.fail_logs {
            return Err("log capture failed".into());
        }
        if !state.containers.iter().any(|c| c.summary.id == container_id) {
            return Err(ErrorKind::ContainerNotFound(container_id.to_owned()).into());
        }
        match stream {
            LogStream::Stdout => Ok(state.stdout.clone()),
            LogStream::Stderr => Ok(state.stderr.clone()),
        }
    }

    fn remove(&self, container_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.containers.retain(|c| c.summary.id != container_id);
        state.removed.push(container_id.to_owned());
        Ok(())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        if self.info.is_none() {
            return Err("host unreachable".into());
        }
        let state = self.state.lock().unwrap();
        Ok(
            state
                .containers
                .iter()
                .filter(|c| all || c.summary.state == "running")
                .map(|c| c.summary.clone())
                .collect(),
        )
    }
}
