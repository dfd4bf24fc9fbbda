extern crate master;
#[macro_use]
extern crate serde_json;
extern crate tempfile;

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use master::apps::{builtin_apps, AppRegistryBuilder};
use master::common::{JobId, JobStatus};
use master::engine::{ContainerEngine, ContainerInspection, ContainerSpec, ContainerSummary,
                     HostInfo, LogStream};
use master::errors::*;
use master::monitor::{MonitorPool, MonitorSettings};
use master::reconciler::{ReconcileOutcome, Reconciler};
use master::scheduling::{Fleet, FleetHost, Scheduler};
use master::shutdown::Shutdown;
use master::store::{JobStore, MemoryJobStore};
use master::submission::{count_by_status, write_batch};

// A container host that plays back a fixed sequence of container states.
struct ScriptedEngine {
    states: Mutex<VecDeque<String>>,
    runs: Mutex<Vec<ContainerSpec>>,
    live: Mutex<Vec<ContainerSummary>>,
    removed: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(states: &[&str]) -> Self {
        ScriptedEngine {
            states: Mutex::new(states.iter().map(|s| s.to_string()).collect()),
            runs: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    fn current_state(&self) -> String {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap()
        } else {
            states.front().cloned().unwrap_or_else(|| "exited".to_owned())
        }
    }
}

impl ContainerEngine for ScriptedEngine {
    fn host_info(&self) -> Result<HostInfo> {
        Ok(HostInfo {
            total_cpus: 4,
            total_memory: 8 << 30,
        })
    }

    fn pull(&self, _image: &str, _tag: &str) -> Result<()> {
        Ok(())
    }

    fn run(&self, spec: &ContainerSpec) -> Result<String> {
        let mut runs = self.runs.lock().unwrap();
        runs.push(spec.clone());
        let id = format!("scripted-{}", runs.len());
        self.live.lock().unwrap().push(ContainerSummary {
            id: id.clone(),
            name: spec.name.clone(),
            state: "running".to_owned(),
        });
        Ok(id)
    }

    fn inspect(&self, container_id: &str) -> Result<ContainerInspection> {
        if !self.live.lock().unwrap().iter().any(|c| c.id == container_id) {
            return Err(ErrorKind::ContainerNotFound(container_id.to_owned()).into());
        }
        let state = self.current_state();
        Ok(ContainerInspection {
            id: container_id.to_owned(),
            state: state.clone(),
            memory_limit: 0,
            nano_cpus: 1_000_000_000,
            raw: json!({"Id": container_id, "State": {"Status": state}}),
        })
    }

    fn logs(&self, _container_id: &str, stream: LogStream) -> Result<Vec<u8>> {
        Ok(match stream {
            LogStream::Stdout => b"hello\nworld\n".to_vec(),
            LogStream::Stderr => Vec::new(),
        })
    }

    fn remove(&self, container_id: &str) -> Result<()> {
        self.live.lock().unwrap().retain(|c| c.id != container_id);
        self.removed.lock().unwrap().push(container_id.to_owned());
        Ok(())
    }

    fn list_containers(&self, _all: bool) -> Result<Vec<ContainerSummary>> {
        Ok(self.live.lock().unwrap().clone())
    }
}

struct Master {
    store: Arc<MemoryJobStore>,
    engine: Arc<ScriptedEngine>,
    fleet: Arc<Fleet>,
    monitors: Arc<MonitorPool>,
    scheduler: Scheduler,
    _jobs_dir: tempfile::TempDir,
}

fn start_master(states: &[&str]) -> Master {
    let store = Arc::new(MemoryJobStore::new());
    let engine = Arc::new(ScriptedEngine::new(states));
    let fleet = Arc::new(Fleet::new(
        vec![
            FleetHost {
                id: "host-a".to_owned(),
                engine: Arc::clone(&engine) as Arc<ContainerEngine>,
            },
        ],
        vec!["cadvisor".to_owned()],
    ));
    let registry = Arc::new(AppRegistryBuilder::new().apps(builtin_apps()).build().unwrap());
    let monitors = Arc::new(MonitorPool::new(4));
    let jobs_dir = tempfile::tempdir().unwrap();

    let scheduler = Scheduler::new(
        Arc::clone(&store) as Arc<JobStore>,
        registry,
        Arc::clone(&fleet),
        Arc::clone(&monitors),
        MonitorSettings {
            poll_interval: Duration::from_millis(10),
            jobs_dir: jobs_dir.path().to_owned(),
        },
        Shutdown::new(),
    );

    Master {
        store: store,
        engine: engine,
        fleet: fleet,
        monitors: monitors,
        scheduler: scheduler,
        _jobs_dir: jobs_dir,
    }
}

fn wait_for_status(store: &MemoryJobStore, id: &JobId, status: JobStatus) {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(10) {
        if store.find_one(id).unwrap().unwrap().status == status {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("job {} never reached {}", id, status.as_str());
}

#[test]
fn submitted_job_runs_to_completion() {
    let master = start_master(&["created", "running", "running", "exited"]);

    let mut ids = Vec::new();
    let specs = "{\"app\": \"Test\", \"params\": {\"app\": {\"echo\": \"hello\"}}}\n";
    assert_eq!(1, write_batch(master.store.as_ref(), Cursor::new(specs), &mut ids, None).unwrap());
    let mut bytes = [0u8; 12];
    bytes.copy_from_slice(&ids);
    let id = JobId::from_bytes(bytes);

    let report = master.scheduler.run_cycle().unwrap();
    assert_eq!(1, report.placed);
    assert!(master.monitors.drain(Some(Duration::from_secs(10))));

    let job = master.store.find_one(&id).unwrap().unwrap();
    assert_eq!(JobStatus::Exited, job.status);
    assert_eq!(Some("host-a".to_owned()), job.host);
    assert_eq!(vec!["hello".to_owned(), "world".to_owned()], job.stdout);
    assert_eq!(Some(json!({"lines": 2})), job.result);
    assert!(job.inspect.is_some());

    let runs = master.engine.runs.lock().unwrap();
    assert_eq!(1, runs.len());
    assert_eq!(1_000_000_000, runs[0].nano_cpus);
    assert_eq!("alpine:latest", runs[0].image);
    assert_eq!(
        vec!["scripted-1".to_owned()],
        *master.engine.removed.lock().unwrap()
    );

    let counts = count_by_status(master.store.as_ref()).unwrap();
    assert_eq!(Some(&1), counts.get(&JobStatus::Exited));
}

#[test]
fn unknown_app_is_failed_without_a_container() {
    let master = start_master(&["running"]);
    let specs = "{\"app\": \"Nope\"}\n";
    let mut ids = Vec::new();
    write_batch(master.store.as_ref(), Cursor::new(specs), &mut ids, None).unwrap();
    let mut bytes = [0u8; 12];
    bytes.copy_from_slice(&ids);

    let report = master.scheduler.run_cycle().unwrap();
    assert_eq!(1, report.failed);

    let job = master.store.find_one(&JobId::from_bytes(bytes)).unwrap().unwrap();
    assert_eq!(JobStatus::Error, job.status);
    assert!(master.engine.runs.lock().unwrap().is_empty());
}

#[test]
fn reconciler_agrees_with_a_running_job() {
    let master = start_master(&["running"]);
    let specs = "{\"app\": \"Test\"}\n";
    let mut ids = Vec::new();
    write_batch(master.store.as_ref(), Cursor::new(specs), &mut ids, None).unwrap();
    let mut bytes = [0u8; 12];
    bytes.copy_from_slice(&ids);
    let id = JobId::from_bytes(bytes);

    master.scheduler.run_cycle().unwrap();
    wait_for_status(&master.store, &id, JobStatus::Running);

    let reconciler = Reconciler::new(
        Arc::clone(&master.store) as Arc<JobStore>,
        Arc::clone(&master.fleet),
        None,
    );
    match reconciler.run().unwrap() {
        ReconcileOutcome::Completed(report) => {
            assert_eq!(1, report.checked);
            assert_eq!(0, report.removed);
        }
        ReconcileOutcome::Skipped => panic!("reconciler should hold the lock"),
    }
    assert_eq!(JobStatus::Running, master.store.find_one(&id).unwrap().unwrap().status);
    assert!(master.engine.removed.lock().unwrap().is_empty());
}
