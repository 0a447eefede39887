//! CLI command implementations

use std::io::{self, Write};

use crate::config::HarnessConfig;
use crate::controller::RunController;
use crate::process::PRIMARY_CLIENT;
use crate::workload::WorkloadPlan;
use crate::workspace::{self, ResetOutcome};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_json, write_json_to};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run(args) => run_harness(args.resolve()?),
        Command::Plan(args) => plan(&args.resolve()?),
        Command::Reset(args) => reset(&args.resolve()?),
    }
}

/// Run both phases and print the report
///
/// The report is printed even when enforcement then fails the command.
pub fn run_harness(config: HarnessConfig) -> CliResult<()> {
    let policy = config.verify;
    let report = RunController::new(config)?.run()?;
    write_json(&report)?;
    report.enforce(policy)?;
    Ok(())
}

/// Print the schema statement and every planned command
pub fn plan(config: &HarnessConfig) -> CliResult<()> {
    let plan = WorkloadPlan::from_config(config);
    let mut stdout = io::stdout().lock();
    write_plan(&plan, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// `client<TAB>stage<TAB>statement`, schema first
pub fn write_plan<W: Write>(plan: &WorkloadPlan, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}\tschema\t{}", PRIMARY_CLIENT, plan.schema())?;
    for planned in plan.commands() {
        writeln!(writer, "{}\t{}\t{}", planned.client, planned.stage, planned.command)?;
    }
    Ok(())
}

/// Remove the storage directory and print the outcome
pub fn reset(config: &HarnessConfig) -> CliResult<()> {
    let outcome = workspace::reset(&config.storage_path());
    let mut stdout = io::stdout().lock();
    write_json_to(&outcome, &mut stdout)?;

    match outcome {
        ResetOutcome::Failed(reason) => Err(CliError::reset_failed(reason)),
        ResetOutcome::Removed | ResetOutcome::Absent => Ok(()),
    }
}
