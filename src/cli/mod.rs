//! Command line interface
//!
//! - init: create the data directory and an empty dataset
//! - serve: answer JSON requests from stdin, one per line
//! - request: answer one JSON request
//! - rebuild: blocking clear-and-rebuild of selected indexes
//! - status: print the persisted rebuild state
//! - generate: write a synthetic dataset

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    boot, generate, init, persist_dataset, rebuild, request, run, run_command, serve, status,
    synthetic_galaxies,
};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_json, write_response};
