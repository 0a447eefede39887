//! Workload generation and fan-out
//!
//! - `command`: the statements the client understands
//! - `plan`: the deterministic, id-major interleaving of stages A/B/C
//! - `driver`: writes the plan into the client pool

mod command;
mod driver;
mod plan;

pub use command::{Aggregate, Command, Intent, TableSpec};
pub use driver::{DriveSummary, WorkloadDriver};
pub use plan::{PlannedCommand, Stage, WorkloadPlan};
