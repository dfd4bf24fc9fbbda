use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bson::oid::ObjectId;
use chrono::prelude::*;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json;
use serde_json::{Map, Value};

use errors::*;
use util::state::StateHandling;

/// Store-assigned identifier of a `Job`: a 12-byte BSON ObjectId.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct JobId([u8; 12]);

impl JobId {
    pub fn generate() -> Self {
        JobId(ObjectId::new().bytes())
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        JobId(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        ObjectId::with_bytes(self.0).to_hex()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let oid = ObjectId::with_string(s).map_err(|err| {
            Error::from(format!("Invalid job id '{}': {}", s, err))
        })?;
        Ok(JobId(oid.bytes()))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> ::std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        JobId::from_str(&hex).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// `JobStatus` follows `unscheduled -> init -> running -> {exited | error}`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Unscheduled,
    Init,
    Running,
    Exited,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self == JobStatus::Exited || self == JobStatus::Error
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Unscheduled => 0,
            JobStatus::Init => 1,
            JobStatus::Running => 2,
            JobStatus::Exited | JobStatus::Error => 3,
        }
    }

    /// Nothing leaves a terminal state. Any other move must go forward, or stay put.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Maps a container engine state string onto the job state machine.
    pub fn from_container_state(state: &str) -> JobStatus {
        match state {
            "exited" | "dead" | "removing" => JobStatus::Exited,
            _ => JobStatus::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            JobStatus::Unscheduled => "unscheduled",
            JobStatus::Init => "init",
            JobStatus::Running => "running",
            JobStatus::Exited => "exited",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True while the container is still doing (or about to do) work.
pub fn is_container_active(state: &str) -> bool {
    state == "running" || state == "created"
}

/// `JobSpec` is what a client submits: the declared, immutable part of a `Job`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub app: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// The `Job` is the persistent unit of work. The store holds the authoritative copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub app: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub ctime: DateTime<Utc>,

    pub status: JobStatus,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub cmd: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default)]
    pub stdout: Vec<String>,
    #[serde(default)]
    pub stderr: Vec<String>,
    #[serde(default)]
    pub inspect: Option<Value>,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl Job {
    pub fn new(id: JobId, spec: JobSpec) -> Self {
        Job {
            id: id,
            app: spec.app,
            input: spec.input,
            params: spec.params,
            ctime: Utc::now(),

            status: JobStatus::Unscheduled,
            host: None,
            container_id: None,
            image: None,
            cmd: Vec::new(),
            workdir: None,

            stdout: Vec::new(),
            stderr: Vec::new(),
            inspect: None,
            output_files: Vec::new(),
            result: None,
        }
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(
                ErrorKind::IllegalTransition(
                    self.id.to_hex(),
                    self.status.to_string(),
                    next.to_string(),
                ).into(),
            );
        }
        self.status = next;
        Ok(())
    }

    /// Records a failure message and moves the job to `error`, unless it already finished.
    pub fn fail<S: Into<String>>(&mut self, message: S) {
        self.stderr.push(message.into());
        if self.status.can_transition_to(JobStatus::Error) {
            self.status = JobStatus::Error;
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Job <{} | {} | {} | {}>",
            self.id,
            self.app,
            self.input.as_ref().map(|s| s.as_str()).unwrap_or("-"),
            self.status
        )
    }
}

impl StateHandling<Error> for Job {
    fn new_from_json(data: serde_json::Value) -> Result<Self> {
        serde_json::from_value(data).chain_err(|| "Unable to create job from JSON")
    }

    fn dump_state(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).chain_err(|| "Unable to convert job to JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_job() -> Job {
        let mut params = Map::new();
        params.insert("app".to_owned(), json!({"echo": "test", "time": 1}));
        Job::new(
            JobId::generate(),
            JobSpec {
                app: "Test".to_owned(),
                input: None,
                params: params,
            },
        )
    }

    #[test]
    fn test_defaults() {
        let job = get_test_job();
        assert_eq!(JobStatus::Unscheduled, job.status);
        assert!(job.host.is_none());
        assert!(job.container_id.is_none());
        assert!(job.stdout.is_empty());
        assert!(job.stderr.is_empty());
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = get_test_job();
        job.transition(JobStatus::Init).unwrap();
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Exited).unwrap();
        assert_eq!(JobStatus::Exited, job.status);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in &[JobStatus::Exited, JobStatus::Error] {
            for next in &[
                JobStatus::Unscheduled,
                JobStatus::Init,
                JobStatus::Running,
                JobStatus::Exited,
                JobStatus::Error,
            ]
            {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn test_no_backwards_transition() {
        let mut job = get_test_job();
        job.transition(JobStatus::Running).unwrap();
        assert!(job.transition(JobStatus::Init).is_err());
        assert_eq!(JobStatus::Running, job.status);
    }

    #[test]
    fn test_fail_keeps_terminal_status() {
        let mut job = get_test_job();
        job.transition(JobStatus::Exited).unwrap();
        job.fail("container vanished");

        assert_eq!(JobStatus::Exited, job.status);
        assert_eq!(vec!["container vanished".to_owned()], job.stderr);
    }

    #[test]
    fn test_status_from_container_state() {
        assert_eq!(JobStatus::Running, JobStatus::from_container_state("created"));
        assert_eq!(JobStatus::Running, JobStatus::from_container_state("running"));
        assert_eq!(JobStatus::Running, JobStatus::from_container_state("paused"));
        assert_eq!(JobStatus::Exited, JobStatus::from_container_state("exited"));
        assert_eq!(JobStatus::Exited, JobStatus::from_container_state("dead"));
        assert!(is_container_active("created"));
        assert!(!is_container_active("exited"));
    }

    #[test]
    fn test_job_id_hex() {
        let id = JobId::generate();
        let parsed: JobId = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(24, id.to_hex().len());
        assert!("not-an-id".parse::<JobId>().is_err());
    }

    #[test]
    fn test_dump_and_load_state() {
        let job = get_test_job();
        let data = job.dump_state().unwrap();
        assert_eq!("unscheduled", data["status"]);
        assert_eq!(json!(job.id.to_hex()), data["id"]);

        let loaded = Job::new_from_json(data).unwrap();
        assert_eq!(job, loaded);
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Job>();
    }

    #[test]
    fn test_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<Job>();
    }
}
