use std::fmt;

use serde_json::Value;

use common::Job;
use errors::*;
use scheduling::ResourceNeed;

const BYTES_PER_GB: u64 = 1_000_000_000;

/// `AppHandler` is the per-application behaviour: how to build the container command for a
/// job and how to turn a finished job's output into a result payload.
pub trait AppHandler: Send + Sync {
    /// Builds the container command. `job.workdir` is already set when the app uses one.
    fn command(&self, job: &Job) -> Result<Vec<String>>;

    /// Extracts the application-defined result once the container has finished.
    fn extract_result(&self, _job: &Job) -> Result<Option<Value>> {
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkdirPolicy {
    /// `<jobs-dir>/<job id>` is created before launch and mounted as the working directory.
    PerJob,
    None,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new<S: Into<String>>(host_path: S, container_path: S, read_only: bool) -> Self {
        VolumeMount {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: read_only,
        }
    }

    /// Volume binding in the `host:container:mode` form understood by container engines.
    pub fn binding(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.host_path, self.container_path, mode)
    }
}

/// `AppDescriptor` is the static description of one registered application.
pub struct AppDescriptor {
    pub name: String,
    pub image: String,
    pub tag: String,
    /// `None` means every core of the host.
    pub threads: Option<u32>,
    /// `None` means all of the host's memory.
    pub memory_gb: Option<u64>,
    pub volumes: Vec<VolumeMount>,
    pub workdir: WorkdirPolicy,

    handler: Box<AppHandler>,
}

impl AppDescriptor {
    pub fn new<S: Into<String>>(name: S, image: S, handler: Box<AppHandler>) -> Self {
        AppDescriptor {
            name: name.into(),
            image: image.into(),
            tag: "latest".to_owned(),
            threads: None,
            memory_gb: None,
            volumes: Vec::new(),
            workdir: WorkdirPolicy::None,

            handler: handler,
        }
    }

    pub fn resource_need(&self) -> ResourceNeed {
        ResourceNeed {
            threads: self.threads,
            memory_bytes: self.memory_gb.map(|gb| gb.saturating_mul(BYTES_PER_GB)),
        }
    }

    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Container names are `<last image path segment>_<job id>`, e.g. `radare2_5b2f...`.
    pub fn container_name(&self, job: &Job) -> String {
        let short_image = self.image.rsplit('/').next().unwrap_or(&self.image);
        let short_image = short_image.split(':').next().unwrap_or(short_image);
        format!("{}_{}", short_image, job.id)
    }

    pub fn command(&self, job: &Job) -> Result<Vec<String>> {
        self.handler.command(job).chain_err(|| {
            format!("Unable to build command for app {}", self.name)
        })
    }

    pub fn extract_result(&self, job: &Job) -> Result<Option<Value>> {
        self.handler.extract_result(job).chain_err(|| {
            format!("Unable to extract result for app {}", self.name)
        })
    }
}

impl fmt::Debug for AppDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AppDescriptor")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("tag", &self.tag)
            .field("threads", &self.threads)
            .field("memory_gb", &self.memory_gb)
            .field("volumes", &self.volumes)
            .field("workdir", &self.workdir)
            .finish()
    }
}
