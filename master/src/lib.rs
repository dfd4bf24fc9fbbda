extern crate bson;
extern crate chrono;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate error_chain;
extern crate futures;
extern crate futures_cpupool;
#[macro_use]
extern crate log;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate signal_hook;
extern crate util;
extern crate uuid;

#[cfg(test)]
extern crate tempfile;

pub mod errors {
    error_chain! {
        links {
            Util(::util::errors::Error, ::util::errors::ErrorKind);
        }

        foreign_links {
            Io(::std::io::Error);
            Json(::serde_json::Error);
        }

        errors {
            AppNotFound(name: String) {
                description("application not registered")
                display("No application registered under the name '{}'", name)
            }
            DuplicateApp(name: String) {
                description("application registered twice")
                display("Application '{}' is registered more than once", name)
            }
            JobNotFound(job_id: String) {
                description("job not found")
                display("No job with id {} in the store", job_id)
            }
            ContainerNotFound(container_id: String) {
                description("container not found")
                display("No container {} on the host", container_id)
            }
            IllegalTransition(job_id: String, from: String, to: String) {
                description("illegal job status transition")
                display("Job {} cannot move from {} to {}", job_id, from, to)
            }
        }
    }
}

pub mod apps;
pub mod common;
pub mod config;
pub mod engine;
pub mod initialization;
pub mod main_loop;
pub mod monitor;
pub mod parser;
pub mod reconciler;
pub mod scheduling;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod submission;
