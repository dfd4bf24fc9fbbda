use std::sync::Arc;

use config::Config;
use errors::*;
use state::StateHandler;
use store::MemoryJobStore;

pub fn initialize_state_handler(config: &Config, store: &Arc<MemoryJobStore>) -> Result<StateHandler> {
    let state_handler = StateHandler::new(Arc::clone(store), !config.nodump, &config.state_location)
        .chain_err(|| "Unable to create StateHandler")?;

    // If our state dump file exists and we aren't running a fresh copy of master we
    // should load from state.
    if !config.fresh && state_handler.dump_file().exists() {
        state_handler.load_state().chain_err(
            || "Unable to load state from file",
        )?;
    }

    Ok(state_handler)
}
