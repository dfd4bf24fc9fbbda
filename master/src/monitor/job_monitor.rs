use std::fs;
use std::fs::File;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json;

use apps::{AppDescriptor, WorkdirPolicy};
use common::{is_container_active, Job, JobId, JobStatus};
use engine::{is_container_not_found, ContainerEngine, ContainerSpec, LogStream};
use errors::*;
use scheduling::Allocation;
use shutdown::Shutdown;
use store::JobStore;
use util::output_error;

const PARAMS_FILE: &str = "params.json";

// Consecutive failed inspections tolerated before the host is considered lost.
const MAX_INSPECT_FAILURES: u32 = 3;

/// Settings shared by every monitor of the master.
#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub jobs_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorOutcome {
    /// The container finished and its output was collected.
    Exited,
    /// Supervision failed. The job is in `error` and the container, if any, was removed.
    Failed,
    /// Shutdown interrupted supervision. The container is left running for a later master.
    Detached,
    /// Shutdown came before the container was started. The job is unscheduled again.
    Released,
}

/// `ContainerGuard` owns a created container and removes it exactly once: on `release`, or
/// when dropped without having been released or detached.
pub struct ContainerGuard {
    engine: Arc<ContainerEngine>,
    container_id: String,
    done: bool,
}

impl ContainerGuard {
    pub fn new(engine: Arc<ContainerEngine>, container_id: String) -> Self {
        ContainerGuard {
            engine: engine,
            container_id: container_id,
            done: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.container_id
    }

    pub fn release(mut self) -> Result<()> {
        self.done = true;
        info!("Removing container {}", self.container_id);
        self.engine.remove(&self.container_id).chain_err(|| {
            format!("Unable to remove container {}", self.container_id)
        })
    }

    /// Gives up ownership without removing the container.
    pub fn detach(mut self) {
        self.done = true;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        info!("Removing container {}", self.container_id);
        if let Err(err) = self.engine.remove(&self.container_id) {
            output_error(&err.chain_err(|| {
                format!("Unable to remove container {}", self.container_id)
            }));
        }
    }
}

/// `JobMonitor` supervises one job's container from creation until it finishes.
///
/// The monitor is the only writer of the job's execution artifacts: container id, captured
/// output, inspection snapshot, output files and result.
pub struct JobMonitor {
    job_id: JobId,
    app: Arc<AppDescriptor>,
    engine: Arc<ContainerEngine>,
    store: Arc<JobStore>,
    settings: MonitorSettings,
    allocation: Allocation,
    shutdown: Shutdown,
}

impl JobMonitor {
    pub fn new(
        job_id: JobId,
        app: Arc<AppDescriptor>,
        engine: Arc<ContainerEngine>,
        store: Arc<JobStore>,
        settings: MonitorSettings,
        allocation: Allocation,
        shutdown: Shutdown,
    ) -> Self {
        JobMonitor {
            job_id: job_id,
            app: app,
            engine: engine,
            store: store,
            settings: settings,
            allocation: allocation,
            shutdown: shutdown,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    fn load_job(&self) -> Result<Job> {
        let job = self.store.find_one(&self.job_id).chain_err(
            || "Unable to load job",
        )?;
        job.chain_err(|| ErrorKind::JobNotFound(self.job_id.to_hex()))
    }

    fn persist(&self, job: &Job) {
        if let Err(err) = self.store.replace(&job.id, job) {
            output_error(&err.chain_err(|| format!("Unable to save job {}", job.id)));
        }
    }

    fn fail(&self, job: &mut Job, err: &Error) {
        let message = err.iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join(": ");
        error!("Job {} failed: {}", job.id, message);
        job.fail(message);
    }

    /// Launches the job's container, then supervises it.
    pub fn launch(self) -> MonitorOutcome {
        let mut job = match self.load_job() {
            Ok(job) => job,
            Err(err) => {
                output_error(&err);
                return MonitorOutcome::Failed;
            }
        };

        if self.shutdown.is_triggered() {
            return self.requeue(&job);
        }

        match self.start_container(&mut job) {
            Ok(guard) => self.supervise(job, guard),
            Err(err) => {
                self.fail(&mut job, &err);
                self.persist(&job);
                MonitorOutcome::Failed
            }
        }
    }

    fn requeue(&self, job: &Job) -> MonitorOutcome {
        match self.store.unclaim(&job.id) {
            Ok(true) => info!("Shutting down, {} goes back to the queue", job),
            Ok(false) => warn!("Job {} moved on before it could be released", job.id),
            Err(err) => {
                output_error(&err.chain_err(|| format!("Unable to release job {}", job.id)))
            }
        }
        MonitorOutcome::Released
    }

    /// Picks up a job whose container was started by an earlier master.
    pub fn resume(self) -> MonitorOutcome {
        let mut job = match self.load_job() {
            Ok(job) => job,
            Err(err) => {
                output_error(&err);
                return MonitorOutcome::Failed;
            }
        };

        let container_id = match job.container_id.clone() {
            Some(container_id) => container_id,
            None => {
                self.fail(&mut job, &"Job has no container to resume".into());
                self.persist(&job);
                return MonitorOutcome::Failed;
            }
        };

        info!("Resuming supervision of {} in container {}", job, container_id);
        let guard = ContainerGuard::new(Arc::clone(&self.engine), container_id);
        self.supervise(job, guard)
    }

    fn prepare_workdir(&self, job: &mut Job) -> Result<()> {
        if self.app.workdir != WorkdirPolicy::PerJob {
            return Ok(());
        }

        let workdir = self.settings.jobs_dir.join(job.id.to_hex());
        fs::create_dir_all(&workdir).chain_err(|| {
            format!("Unable to create working directory {}", workdir.display())
        })?;
        fs::set_permissions(&workdir, fs::Permissions::from_mode(0o777))
            .chain_err(|| "Unable to open up working directory permissions")?;

        let params = serde_json::to_string_pretty(&job.params).chain_err(
            || "Unable to serialize job parameters",
        )?;
        let mut file = File::create(workdir.join(PARAMS_FILE)).chain_err(
            || "Unable to create parameters file",
        )?;
        file.write_all(params.as_bytes()).chain_err(
            || "Unable to write parameters file",
        )?;

        job.workdir = Some(workdir);
        Ok(())
    }

    fn container_spec(&self, job: &Job) -> Result<ContainerSpec> {
        let mut volumes: Vec<String> = self.app.volumes.iter().map(|v| v.binding()).collect();
        let working_dir = match job.workdir {
            Some(ref workdir) => {
                let dir = workdir.to_string_lossy().into_owned();
                volumes.push(format!("{}:{}:rw", dir, dir));
                Some(dir)
            }
            None => None,
        };

        Ok(ContainerSpec {
            name: self.app.container_name(job),
            image: self.app.image_reference(),
            cmd: job.cmd.clone(),
            nano_cpus: self.allocation.nano_cpus,
            memory_bytes: self.allocation.memory_bytes,
            volumes: volumes,
            working_dir: working_dir,
        })
    }

    fn start_container(&self, job: &mut Job) -> Result<ContainerGuard> {
        self.prepare_workdir(job)?;
        job.cmd = self.app.command(job)?;
        job.image = Some(self.app.image_reference());

        self.engine.pull(&self.app.image, &self.app.tag).chain_err(|| {
            format!("Unable to pull {}", self.app.image_reference())
        })?;

        let spec = self.container_spec(job)?;
        let container_id = self.engine.run(&spec).chain_err(|| {
            format!("Unable to start container {}", spec.name)
        })?;
        let guard = ContainerGuard::new(Arc::clone(&self.engine), container_id.clone());

        job.container_id = Some(container_id);
        job.transition(JobStatus::Running)?;
        self.store.replace(&job.id, job).chain_err(
            || "Unable to save started job",
        )?;

        info!(
            "Started {} in container {} on {}",
            job,
            guard.id(),
            job.host.as_ref().map(|s| s.as_str()).unwrap_or("-")
        );
        Ok(guard)
    }

    fn supervise(&self, mut job: Job, guard: ContainerGuard) -> MonitorOutcome {
        match self.watch(&mut job, &guard) {
            Ok(true) => {
                let outcome = match self.collect(&mut job, &guard) {
                    Ok(()) => MonitorOutcome::Exited,
                    Err(err) => {
                        self.fail(&mut job, &err);
                        MonitorOutcome::Failed
                    }
                };
                self.finalize(&mut job, guard);
                outcome
            }
            Ok(false) => {
                self.persist(&job);
                guard.detach();
                info!("Detached from {}, its container keeps running", job);
                MonitorOutcome::Detached
            }
            Err(err) => {
                self.fail(&mut job, &err);
                self.finalize(&mut job, guard);
                MonitorOutcome::Failed
            }
        }
    }

    // Polls the container until it is no longer active. Returns false if shutdown interrupted
    // the wait.
    fn watch(&self, job: &mut Job, guard: &ContainerGuard) -> Result<bool> {
        let mut failures = 0;
        loop {
            if self.shutdown.is_triggered() {
                return Ok(false);
            }

            match self.engine.inspect(guard.id()) {
                Ok(inspection) => {
                    failures = 0;
                    if !is_container_active(&inspection.state) {
                        return Ok(true);
                    }
                    let status = JobStatus::from_container_state(&inspection.state);
                    if status != job.status && job.status.can_transition_to(status) {
                        job.status = status;
                        self.store.update_status(&job.id, status)?;
                    }
                }
                Err(err) => {
                    if is_container_not_found(&err) {
                        return Err(err).chain_err(|| "Container disappeared");
                    }
                    failures += 1;
                    if failures >= MAX_INSPECT_FAILURES {
                        return Err(err).chain_err(|| "Lost contact with the container's host");
                    }
                    warn!(
                        "Unable to inspect container {} of job {} ({}/{}): {}",
                        guard.id(),
                        job.id,
                        failures,
                        MAX_INSPECT_FAILURES,
                        err
                    );
                }
            }

            if !self.shutdown.sleep(self.settings.poll_interval) {
                return Ok(false);
            }
        }
    }

    fn capture(&self, container_id: &str, stream: LogStream) -> Result<Vec<String>> {
        let bytes = self.engine.logs(container_id, stream).chain_err(|| {
            format!("Unable to capture logs of container {}", container_id)
        })?;
        Ok(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|line| line.to_owned())
                .collect(),
        )
    }

    // Captures the output of a finished container and extracts the app's result.
    fn collect(&self, job: &mut Job, guard: &ContainerGuard) -> Result<()> {
        job.stdout = self.capture(guard.id(), LogStream::Stdout)?;
        let stderr = self.capture(guard.id(), LogStream::Stderr)?;
        job.stderr.extend(stderr);

        job.result = self.app.extract_result(job)?;
        job.transition(JobStatus::Exited)?;
        info!("{} exited", job);
        Ok(())
    }

    // Records the final inspection and the output files, saves the job and removes the
    // container. Runs on every path that ends supervision.
    fn finalize(&self, job: &mut Job, guard: ContainerGuard) {
        match self.engine.inspect(guard.id()) {
            Ok(inspection) => job.inspect = Some(inspection.raw),
            Err(err) => {
                warn!("No final inspection for job {}: {}", job.id, err);
            }
        }

        if let Some(workdir) = job.workdir.clone() {
            match list_files(&workdir) {
                Ok(files) => job.output_files = files,
                Err(err) => output_error(&err),
            }
        }

        self.persist(job);
        if let Err(err) = guard.release() {
            output_error(&err);
        }
    }
}

fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(dir).chain_err(|| {
        format!("Unable to list working directory {}", dir.display())
    })?;
    for entry in entries {
        let entry = entry.chain_err(|| "Unable to read directory entry")?;
        files.push(entry.file_name().to_string_lossy().into_owned());
    }
    files.sort();
    Ok(files)
}
