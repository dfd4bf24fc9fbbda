use std::sync::Arc;

use apps::AppRegistry;
use config::Config;
use errors::*;
use initialization::{initialize_app_registry, initialize_state_handler, submit_from_file};
use monitor::{MonitorPool, MonitorSettings};
use reconciler::Reconciler;
use scheduling::{Fleet, Scheduler};
use shutdown::Shutdown;
use state::StateHandler;
use store::{JobStore, MemoryJobStore};

pub struct MasterResources {
    pub config: Config,
    pub store: Arc<MemoryJobStore>,
    pub registry: Arc<AppRegistry>,
    pub fleet: Arc<Fleet>,
    pub monitors: Arc<MonitorPool>,
    pub scheduler: Arc<Scheduler>,
    pub reconciler: Arc<Reconciler>,
    pub state_handler: StateHandler,
    pub shutdown: Shutdown,
}

impl MasterResources {
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(initialize_app_registry(&config).chain_err(
            || "Error initializing application registry",
        )?);

        let store = Arc::new(MemoryJobStore::new());
        let state_handler = initialize_state_handler(&config, &store).chain_err(
            || "Error initializing state handler",
        )?;
        let job_store = Arc::clone(&store) as Arc<JobStore>;

        let fleet = Arc::new(Fleet::from_endpoints(&config.hosts, config.protected.clone()));
        let monitors = Arc::new(MonitorPool::new(config.max_monitors));
        let shutdown = Shutdown::new();
        shutdown.trigger_on_signals().chain_err(
            || "Unable to install signal handlers",
        )?;

        let settings = MonitorSettings {
            poll_interval: config.poll_interval,
            jobs_dir: config.jobs_dir.clone(),
        };
        let mut scheduler = Scheduler::new(
            Arc::clone(&job_store),
            Arc::clone(&registry),
            Arc::clone(&fleet),
            Arc::clone(&monitors),
            settings,
            shutdown.clone(),
        );
        scheduler.set_shuffle_hosts(config.shuffle);
        let scheduler = Arc::new(scheduler);

        scheduler.resume_interrupted_jobs().chain_err(
            || "Unable to resume interrupted jobs",
        )?;

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&job_store),
            Arc::clone(&fleet),
            config.lock_lease,
        ));

        if let Some(ref path) = config.submit {
            let batch = config.batch.as_ref().map(String::as_str);
            submit_from_file(job_store.as_ref(), path, batch)?;
        }

        Ok(MasterResources {
            config: config,
            store: store,
            registry: registry,
            fleet: fleet,
            monitors: monitors,
            scheduler: scheduler,
            reconciler: reconciler,
            state_handler: state_handler,
            shutdown: shutdown,
        })
    }
}
