extern crate master;
extern crate util;

use master::config::Config;
use master::errors::*;
use master::initialization::MasterResources;
use master::main_loop::run_main_loop;
use master::parser;

fn run() -> Result<()> {
    util::init_logger().chain_err(|| "Failed to initialise logging.")?;

    let matches = parser::parse_command_line();
    let config = Config::from_matches(&matches).chain_err(
        || "Invalid command line arguments",
    )?;

    let resources = MasterResources::new(config).chain_err(
        || "Error initializing master",
    )?;
    run_main_loop(resources)
}

fn main() {
    if let Err(ref e) = run() {
        eprintln!("error: {}", e);
        for e in e.iter().skip(1) {
            eprintln!("caused by: {}", e);
        }

        if let Some(backtrace) = e.backtrace() {
            eprintln!("backtrace: {:?}", backtrace);
        }

        ::std::process::exit(1);
    }
}
