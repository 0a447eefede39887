//! Deterministic workload plan
//!
//! Three stages, each fanned out over every client:
//!
//! - Stage A: insert ids `[0, N)`
//! - Stage B: insert ids `[N, 2N)`
//! - Stage C: delete ids `[0, N)`
//!
//! Within a stage the outer loop is over ids and the inner loop over
//! clients, so all n clients write the same key back to back. That
//! cross-client contention on one key is what the run probes.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use super::command::{Command, TableSpec};
use crate::config::HarnessConfig;

/// One of the three load stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    A,
    B,
    C,
}

impl Stage {
    /// Stages in the order they are sent
    pub const ALL: [Stage; 3] = [Stage::A, Stage::B, Stage::C];

    /// Ids touched by this stage for a given N
    pub fn id_range(&self, rows: u64) -> Range<u64> {
        match self {
            Stage::A | Stage::C => 0..rows,
            Stage::B => rows..rows * 2,
        }
    }

    pub fn command_for(&self, table: &TableSpec, id: u64) -> Command {
        match self {
            Stage::A | Stage::B => Command::insert(table, id),
            Stage::C => Command::delete(table, id),
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            Stage::A => 0,
            Stage::B => 1,
            Stage::C => 2,
        }
    }

    /// Scope name used in logs
    pub fn scope_name(&self) -> &'static str {
        match self {
            Stage::A => "STAGE_A",
            Stage::B => "STAGE_B",
            Stage::C => "STAGE_C",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::A => "A",
            Stage::B => "B",
            Stage::C => "C",
        };
        f.write_str(label)
    }
}

/// A command addressed to one client within one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub client: usize,
    pub stage: Stage,
    pub id: u64,
    pub command: Command,
}

/// The ordered list of every load command of phase 1
#[derive(Debug, Clone)]
pub struct WorkloadPlan {
    table: TableSpec,
    rows: u64,
    clients: usize,
    commands: Vec<PlannedCommand>,
}

impl WorkloadPlan {
    /// Build the plan for N = `rows` ids and n = `clients` clients
    pub fn build(table: TableSpec, rows: u64, clients: usize) -> Self {
        let per_stage = rows as usize * clients;
        let mut commands = Vec::with_capacity(per_stage * Stage::ALL.len());

        for stage in Stage::ALL {
            for id in stage.id_range(rows) {
                for client in 0..clients {
                    commands.push(PlannedCommand {
                        client,
                        stage,
                        id,
                        command: stage.command_for(&table, id),
                    });
                }
            }
        }

        Self {
            table,
            rows,
            clients,
            commands,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::build(TableSpec::from_config(config), config.rows, config.clients)
    }

    /// DDL sent by client 0 before any load
    pub fn schema(&self) -> Command {
        Command::create_table(&self.table)
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn clients(&self) -> usize {
        self.clients
    }

    /// Every command in send order
    pub fn commands(&self) -> &[PlannedCommand] {
        &self.commands
    }

    /// The contiguous slice belonging to one stage
    pub fn stage(&self, stage: Stage) -> &[PlannedCommand] {
        let per_stage = self.rows as usize * self.clients;
        let start = stage.ordinal() * per_stage;
        &self.commands[start..start + per_stage]
    }

    /// n·3N
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
