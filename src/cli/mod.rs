//! CLI module for rmdb-harness
//!
//! Provides command-line interface for:
//! - run: full two-phase run, report on stdout
//! - plan: print the workload
//! - reset: clear the storage directory

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, ConfigArgs};
pub use commands::{plan, reset, run, run_command, run_harness, write_plan};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_json_to};
