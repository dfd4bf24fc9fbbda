extern crate env_logger;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate serde_json;

pub mod errors {
    error_chain!{}
}

pub mod logging;
pub mod state;

pub use logging::init_logger;
pub use logging::output_error;
