//! rmdb-harness - concurrency and crash-recovery verification for rmdb
//!
//! One run drives the rmdb server through two phases:
//!
//! 1. Start the server on a freshly reset storage directory, load it through
//!    n concurrent clients, query the aggregates, then SIGKILL it.
//! 2. Restart it on the same directory, query the aggregates through one
//!    client and compare them with what the workload must have left behind.
//!
//! Module map:
//! - `workspace`: storage directory reset
//! - `process`: server and client processes, readiness, cleanup stack
//! - `workload`: command plan and its fan-out over the client pool
//! - `verify`: aggregate queries, output parsing, verdicts
//! - `controller`: the run state machine
//! - `config`, `errors`, `observability`: ambient concerns
//! - `cli`: command-line front end

pub mod cli;
pub mod config;
pub mod controller;
pub mod errors;
pub mod observability;
pub mod process;
pub mod verify;
pub mod workload;
pub mod workspace;

pub use config::HarnessConfig;
pub use controller::{RunController, RunReport, RunState};
pub use errors::{HarnessError, HarnessResult};
