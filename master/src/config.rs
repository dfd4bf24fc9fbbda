use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ArgMatches;

use errors::*;

const DEFAULT_HOSTS: &str = "unix:///var/run/docker.sock";
const DEFAULT_JOBS_DIR: &str = "/scratch/jobs";
const DEFAULT_SCHEDULE_INTERVAL_SECS: &str = "5";
const DEFAULT_POLL_INTERVAL_SECS: &str = "10";
const DEFAULT_RECONCILE_INTERVAL_SECS: &str = "60";
const DEFAULT_MAX_MONITORS: &str = "64";
const DEFAULT_LOCK_LEASE_SECS: &str = "600";
const DEFAULT_PROTECTED: &str = "cadvisor";
const DEFAULT_DUMP_DIR: &str = "/var/lib/shipyard";

/// Everything the master needs from the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub hosts: Vec<String>,
    pub jobs_dir: PathBuf,
    pub apps_file: Option<PathBuf>,
    pub schedule_interval: Duration,
    pub poll_interval: Duration,
    pub reconcile_interval: Duration,
    pub max_monitors: usize,
    /// `None` when the reconciler lock never expires.
    pub lock_lease: Option<Duration>,
    pub protected: Vec<String>,
    pub shuffle: bool,
    pub state_location: PathBuf,
    pub fresh: bool,
    pub nodump: bool,
    pub submit: Option<PathBuf>,
    /// Batch name the startup submission is recorded under.
    pub batch: Option<String>,
}

fn parse_value<T: FromStr>(matches: &ArgMatches, name: &str, default: &str) -> Result<T> {
    let value = matches.value_of(name).unwrap_or(default);
    value.parse::<T>().map_err(|_| {
        format!("Invalid value '{}' for --{}", value, name).into()
    })
}

fn parse_seconds(matches: &ArgMatches, name: &str, default: &str) -> Result<Duration> {
    let secs: u64 = parse_value(matches, name, default)?;
    Ok(Duration::from_secs(secs))
}

fn parse_list(matches: &ArgMatches, name: &str, default: &str) -> Vec<String> {
    matches
        .value_of(name)
        .unwrap_or(default)
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_owned())
        .collect()
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let hosts = parse_list(matches, "hosts", DEFAULT_HOSTS);
        if hosts.is_empty() {
            return Err("At least one container host must be given".into());
        }

        let schedule_interval = parse_seconds(matches, "schedule-interval", DEFAULT_SCHEDULE_INTERVAL_SECS)?;
        let poll_interval = parse_seconds(matches, "poll-interval", DEFAULT_POLL_INTERVAL_SECS)?;
        let reconcile_interval = parse_seconds(matches, "reconcile-interval", DEFAULT_RECONCILE_INTERVAL_SECS)?;
        if schedule_interval.as_secs() == 0 || poll_interval.as_secs() == 0 ||
            reconcile_interval.as_secs() == 0
        {
            return Err("Intervals must be at least one second".into());
        }

        let max_monitors: usize = parse_value(matches, "max-monitors", DEFAULT_MAX_MONITORS)?;
        if max_monitors == 0 {
            return Err("--max-monitors must be at least 1".into());
        }

        let lock_lease = parse_seconds(matches, "lock-lease", DEFAULT_LOCK_LEASE_SECS)?;
        let lock_lease = if lock_lease.as_secs() == 0 {
            None
        } else {
            Some(lock_lease)
        };

        Ok(Config {
            hosts: hosts,
            jobs_dir: PathBuf::from(matches.value_of("jobs-dir").unwrap_or(DEFAULT_JOBS_DIR)),
            apps_file: matches.value_of("apps").map(PathBuf::from),
            schedule_interval: schedule_interval,
            poll_interval: poll_interval,
            reconcile_interval: reconcile_interval,
            max_monitors: max_monitors,
            lock_lease: lock_lease,
            protected: parse_list(matches, "protected", DEFAULT_PROTECTED),
            shuffle: !matches.is_present("no-shuffle"),
            state_location: PathBuf::from(matches.value_of("state-location").unwrap_or(DEFAULT_DUMP_DIR)),
            fresh: matches.is_present("fresh"),
            nodump: matches.is_present("nodump"),
            submit: matches.value_of("submit").map(PathBuf::from),
            batch: matches.value_of("batch").map(|name| name.to_owned()),
        })
    }
}
