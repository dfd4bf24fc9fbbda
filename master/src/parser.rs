use clap::{App, Arg, ArgMatches};

pub fn build_app<'a, 'b>() -> App<'a, 'b> {
    App::new("master")
        .version(crate_version!())
        .author("Shipyard Authors <shipyard@example.org>")
        .about(
            "Schedules analysis jobs as containers across a fleet of container hosts",
        )
        .arg(
            Arg::with_name("hosts")
                .long("hosts")
                .short("H")
                .help("Comma separated list of container engine endpoints")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("jobs-dir")
                .long("jobs-dir")
                .short("j")
                .help("Directory under which per job working directories are created")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("apps")
                .long("apps")
                .short("a")
                .help("JSON file describing additional applications")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("schedule-interval")
                .long("schedule-interval")
                .help("Seconds between scheduling passes")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("poll-interval")
                .long("poll-interval")
                .help("Seconds between container inspections of a running job")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("reconcile-interval")
                .long("reconcile-interval")
                .help("Seconds between reconciliations of the job store with the hosts")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("max-monitors")
                .long("max-monitors")
                .short("m")
                .help("Maximum number of jobs supervised at once")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("lock-lease")
                .long("lock-lease")
                .help(
                    "Seconds after which a held reconciler lock is considered stale, 0 to never expire it",
                )
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("protected")
                .long("protected")
                .short("p")
                .help("Comma separated container names ignored by resource accounting and cleanup")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("no-shuffle")
                .long("no-shuffle")
                .help("Tries hosts in the order given instead of a random order")
                .takes_value(false)
                .required(false),
        )
        .arg(
            Arg::with_name("fresh")
                .long("fresh")
                .short("f")
                .help("Skips state loading")
                .takes_value(false)
                .required(false),
        )
        .arg(
            Arg::with_name("nodump")
                .long("nodump")
                .short("n")
                .help("Skips state dumping")
                .takes_value(false)
                .required(false),
        )
        .arg(
            Arg::with_name("state-location")
                .long("state-location")
                .short("s")
                .help("The location that state is saved to and loaded from")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("submit")
                .long("submit")
                .help("JSON lines file of job specs to submit at startup")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("batch")
                .long("batch")
                .help("Records the startup submission under this batch name and skips it if the batch exists")
                .takes_value(true)
                .requires("submit")
                .required(false),
        )
}

pub fn parse_command_line<'a>() -> ArgMatches<'a> {
    build_app().get_matches()
}
