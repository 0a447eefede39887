//! Summary of a completed run
//!
//! Printed as a single JSON object once the run reaches Done. Whether a
//! failed verdict fails the run is decided by `enforce`, so a report is
//! always available even when verification is strict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::RunState;
use crate::config::VerifyPolicy;
use crate::errors::{HarnessError, HarnessResult};
use crate::process::{ClientExit, ServerExit};
use crate::verify::Verdict;
use crate::workload::DriveSummary;
use crate::workspace::ResetOutcome;

/// What one phase did and saw
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: u8,
    pub server_pid: u32,
    pub client_pids: Vec<u32>,
    pub clients: Vec<ClientExit>,
    pub server_exit: ServerExit,
    pub verdict: Verdict,
}

/// Serializable record of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: u64,
    pub clients: usize,
    pub storage_dir: String,
    pub workspace: ResetOutcome,
    pub states: Vec<RunState>,
    pub workload: DriveSummary,
    pub phase1: PhaseReport,
    pub phase2: PhaseReport,
}

impl RunReport {
    /// Verdicts that failed, phase order
    pub fn failed_verdicts(&self) -> Vec<&Verdict> {
        [&self.phase1.verdict, &self.phase2.verdict]
            .into_iter()
            .filter(|v| v.is_failed())
            .collect()
    }

    /// Apply the pass/fail policy
    pub fn enforce(&self, policy: VerifyPolicy) -> HarnessResult<()> {
        if policy == VerifyPolicy::Report {
            return Ok(());
        }
        let failures: Vec<String> = self
            .failed_verdicts()
            .iter()
            .flat_map(|verdict| {
                verdict
                    .mismatches
                    .iter()
                    .map(move |m| format!("phase {} {}", verdict.phase, m))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::VerificationFailed(failures.join("; ")))
        }
    }
}
