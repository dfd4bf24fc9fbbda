use std::process::{Command, Output, Stdio};

use serde_json;
use serde_json::Value;

use common::NANOS_PER_CPU;
use engine::{ContainerEngine, ContainerInspection, ContainerSpec, ContainerSummary, HostInfo,
             LogStream};
use errors::*;

const DOCKER_BINARY: &str = "docker";
const JSON_FORMAT: &str = "{{json .}}";

/// `DockerCliEngine` drives one Docker daemon through the `docker -H <endpoint>` command line.
pub struct DockerCliEngine {
    endpoint: String,
}

impl DockerCliEngine {
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        DockerCliEngine { endpoint: endpoint.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn command(&self, args: &[String]) -> Result<Output> {
        debug!("docker -H {} {}", self.endpoint, args.join(" "));
        Command::new(DOCKER_BINARY)
            .arg("-H")
            .arg(&self.endpoint)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .chain_err(|| format!("Unable to run docker against {}", self.endpoint))
    }

    // Runs the command and fails with its stderr when it exits non-zero.
    fn checked(&self, args: &[String]) -> Result<Output> {
        let output = self.command(args)?;
        if !output.status.success() {
            return Err(
                format!(
                    "docker {} failed on {}: {}",
                    args.first().map(|s| s.as_str()).unwrap_or(""),
                    self.endpoint,
                    String::from_utf8_lossy(&output.stderr).trim()
                ).into(),
            );
        }
        Ok(output)
    }
}

fn args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

fn is_not_found(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("No such")
}

pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut run = args(&["run", "--detach", "--name", spec.name.as_str()]);
    if spec.memory_bytes > 0 {
        run.push(format!("--memory={}b", spec.memory_bytes));
    }
    if spec.nano_cpus > 0 {
        run.push(format!("--cpus={}", spec.nano_cpus as f64 / NANOS_PER_CPU as f64));
    }
    for volume in &spec.volumes {
        run.push("--volume".to_owned());
        run.push(volume.clone());
    }
    if let Some(ref dir) = spec.working_dir {
        run.push("--workdir".to_owned());
        run.push(dir.clone());
    }
    run.push(spec.image.clone());
    run.extend(spec.cmd.iter().cloned());
    run
}

pub fn parse_host_info(data: &str) -> Result<HostInfo> {
    let info: Value = serde_json::from_str(data.trim()).chain_err(
        || "Unable to parse docker info output",
    )?;
    let total_cpus = info["NCPU"].as_u64().chain_err(
        || "docker info has no NCPU",
    )?;
    if total_cpus > u64::from(u32::max_value()) {
        return Err(format!("docker info reports {} CPUs", total_cpus).into());
    }
    let total_memory = info["MemTotal"].as_u64().chain_err(
        || "docker info has no MemTotal",
    )?;

    Ok(HostInfo {
        total_cpus: total_cpus as u32,
        total_memory: total_memory,
    })
}

pub fn parse_inspection(data: &str) -> Result<ContainerInspection> {
    let documents: Vec<Value> = serde_json::from_str(data.trim()).chain_err(
        || "Unable to parse docker inspect output",
    )?;
    let raw = documents.into_iter().next().chain_err(
        || "docker inspect returned nothing",
    )?;

    let id = raw["Id"].as_str().chain_err(|| "Container has no Id")?.to_owned();
    let state = raw["State"]["Status"]
        .as_str()
        .chain_err(|| "Container has no State.Status")?
        .to_owned();

    Ok(ContainerInspection {
        id: id,
        state: state,
        memory_limit: raw["HostConfig"]["Memory"].as_u64().unwrap_or(0),
        nano_cpus: raw["HostConfig"]["NanoCpus"].as_u64().unwrap_or(0),
        raw: raw,
    })
}

/// Parses `docker ps --format '{{json .}}'`, one JSON object per line.
pub fn parse_container_list(data: &str) -> Result<Vec<ContainerSummary>> {
    let mut containers = Vec::new();
    for line in data.lines().filter(|line| !line.trim().is_empty()) {
        let entry: Value = serde_json::from_str(line).chain_err(
            || "Unable to parse docker ps output",
        )?;
        let id = entry["ID"].as_str().chain_err(|| "Container has no ID")?;
        let names = entry["Names"].as_str().unwrap_or("");
        let state = entry["State"].as_str().unwrap_or("unknown");

        containers.push(ContainerSummary {
            id: id.to_owned(),
            name: names.split(',').next().unwrap_or("").to_owned(),
            state: state.to_owned(),
        });
    }
    Ok(containers)
}

impl ContainerEngine for DockerCliEngine {
    fn host_info(&self) -> Result<HostInfo> {
        let output = self.checked(&args(&["info", "--format", JSON_FORMAT]))?;
        parse_host_info(&String::from_utf8_lossy(&output.stdout))
    }

    fn pull(&self, image: &str, tag: &str) -> Result<()> {
        let reference = format!("{}:{}", image, tag);
        self.checked(&args(&["pull", reference.as_str()]))?;
        Ok(())
    }

    fn run(&self, spec: &ContainerSpec) -> Result<String> {
        let output = self.checked(&run_args(spec))?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if id.is_empty() {
            return Err(format!("docker run returned no id for {}", spec.name).into());
        }
        Ok(id)
    }

    fn inspect(&self, container_id: &str) -> Result<ContainerInspection> {
        let output = self.command(&args(&["inspect", "--type", "container", container_id]))?;
        if !output.status.success() {
            if is_not_found(&output.stderr) {
                return Err(ErrorKind::ContainerNotFound(container_id.to_owned()).into());
            }
            return Err(
                format!(
                    "docker inspect failed on {}: {}",
                    self.endpoint,
                    String::from_utf8_lossy(&output.stderr).trim()
                ).into(),
            );
        }
        parse_inspection(&String::from_utf8_lossy(&output.stdout))
    }

    fn logs(&self, container_id: &str, stream: LogStream) -> Result<Vec<u8>> {
        // docker logs replays the container's streams on its own stdout and stderr.
        let output = self.checked(&args(&["logs", container_id]))?;
        match stream {
            LogStream::Stdout => Ok(output.stdout),
            LogStream::Stderr => Ok(output.stderr),
        }
    }

    fn remove(&self, container_id: &str) -> Result<()> {
        let output = self.command(&args(&["rm", "--force", container_id]))?;
        if !output.status.success() && !is_not_found(&output.stderr) {
            return Err(
                format!(
                    "docker rm failed on {}: {}",
                    self.endpoint,
                    String::from_utf8_lossy(&output.stderr).trim()
                ).into(),
            );
        }
        Ok(())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let mut ps = args(&["ps", "--no-trunc", "--format", JSON_FORMAT]);
        if all {
            ps.push("--all".to_owned());
        }
        let output = self.checked(&ps)?;
        parse_container_list(&String::from_utf8_lossy(&output.stdout))
    }
}
