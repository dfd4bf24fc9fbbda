mod app_registry;
mod master_resources;
mod state_handler;
mod submission;

pub use self::app_registry::initialize_app_registry;
pub use self::master_resources::MasterResources;
pub use self::state_handler::initialize_state_handler;
pub use self::submission::submit_from_file;
