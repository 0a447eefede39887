//! Fan-out of the plan across the client pool
//!
//! Commands are written in plan order. At each stage boundary every
//! client's buffer is flushed and every client is checked for liveness
//! before the next stage starts. The driver waits for commands to be sent,
//! never for the server to apply them.

use std::thread;
use std::time::Duration;

use serde::Serialize;

use super::plan::{Stage, WorkloadPlan};
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::process::ClientPool;

/// Number of commands sent per stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveSummary {
    pub stage_a: usize,
    pub stage_b: usize,
    pub stage_c: usize,
}

impl DriveSummary {
    pub fn total(&self) -> usize {
        self.stage_a + self.stage_b + self.stage_c
    }

    fn record(&mut self, stage: Stage, sent: usize) {
        match stage {
            Stage::A => self.stage_a = sent,
            Stage::B => self.stage_b = sent,
            Stage::C => self.stage_c = sent,
        }
    }
}

/// Sends a `WorkloadPlan` through a `ClientPool`
pub struct WorkloadDriver<'p> {
    plan: &'p WorkloadPlan,
}

impl<'p> WorkloadDriver<'p> {
    pub fn new(plan: &'p WorkloadPlan) -> Self {
        Self { plan }
    }

    /// Client 0 creates the table, then the server gets `settle` to apply it
    pub fn send_schema(&self, pool: &mut ClientPool, settle: Duration) -> HarnessResult<()> {
        let schema = self.plan.schema();
        pool.send_primary(&schema)?;
        pool.flush()?;
        log_event_with_fields(Event::SchemaSent, &[("statement", schema.text())]);

        thread::sleep(settle);
        pool.check_alive()
    }

    /// Send stages A, B and C in order
    pub fn drive(&self, pool: &mut ClientPool) -> HarnessResult<DriveSummary> {
        if pool.len() != self.plan.clients() {
            return Err(HarnessError::Invariant(format!(
                "plan is for {} clients but the pool has {}",
                self.plan.clients(),
                pool.len()
            )));
        }

        let mut summary = DriveSummary::default();
        for stage in Stage::ALL {
            let sent = self.drive_stage(pool, stage)?;
            summary.record(stage, sent);
        }
        Ok(summary)
    }

    fn drive_stage(&self, pool: &mut ClientPool, stage: Stage) -> HarnessResult<usize> {
        let commands = self.plan.stage(stage);
        let count = commands.len().to_string();
        let scope = ObservationScope::with_fields(stage.scope_name(), &[("commands", &count)]);

        let result = commands
            .iter()
            .try_for_each(|planned| pool.send(planned.client, &planned.command))
            .and_then(|_| pool.flush())
            .and_then(|_| pool.check_alive());

        match result {
            Ok(()) => {
                scope.complete();
                Ok(commands.len())
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }
}
