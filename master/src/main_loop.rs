use std::{thread, time};

use errors::*;
use initialization::MasterResources;
use reconciler::run_reconcile_loop;
use scheduling::run_scheduling_loop;
use util::output_error;

const MAIN_LOOP_SLEEP_MS: u64 = 100;
const DUMP_LOOP_MS: u64 = 5000;

fn dump_state(state: &MasterResources) {
    if state.config.nodump {
        return;
    }
    if let Err(err) = state.state_handler.dump_state() {
        output_error(&err.chain_err(|| "Unable to dump state"));
    }
}

/// Runs the scheduling and reconciliation loops until shutdown is triggered (SIGINT or
/// SIGTERM), then drains every monitor and writes a final state dump.
pub fn run_main_loop(state: MasterResources) -> Result<()> {
    let scheduling_thread = run_scheduling_loop(
        state.scheduler.clone(),
        state.config.schedule_interval,
        state.shutdown.clone(),
    );
    let reconcile_thread = run_reconcile_loop(
        state.reconciler.clone(),
        state.config.reconcile_interval,
        state.shutdown.clone(),
    );

    let mut iterations_since_state_dump = 0;
    while !state.shutdown.is_triggered() {
        thread::sleep(time::Duration::from_millis(MAIN_LOOP_SLEEP_MS));

        iterations_since_state_dump += 1;
        if iterations_since_state_dump * MAIN_LOOP_SLEEP_MS >= DUMP_LOOP_MS {
            dump_state(&state);
            iterations_since_state_dump = 0;
        }
    }

    info!("Shutting down, waiting for {} monitors", state.monitors.active());

    if scheduling_thread.join().is_err() {
        error!("Scheduling loop panicked");
    }
    if reconcile_thread.join().is_err() {
        error!("Reconcile loop panicked");
    }

    state.monitors.drain(None);
    dump_state(&state);

    info!("Master stopped");
    Ok(())
}
