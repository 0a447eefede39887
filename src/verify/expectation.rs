//! Expected aggregates and verdicts
//!
//! After the whole workload has been applied the surviving ids are exactly
//! `[N, 2N)`, each stored n times: the n-fold inserts of `[0, N)` are all
//! removed by the n-fold deletes, and deleting an id that is already gone
//! changes nothing.

use serde::Serialize;

use super::Observation;
use crate::config::CountMode;

/// Values a correct server reports once every command was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub count: i64,
    pub min: i64,
    pub max: i64,
}

impl Expectation {
    /// Final state for N = `rows` ids and n = `clients` clients
    pub fn after_workload(rows: u64, clients: usize, count_mode: CountMode) -> Self {
        let rows = rows as i64;
        let count = match count_mode {
            CountMode::Rows => rows * clients as i64,
            CountMode::Distinct => rows,
        };
        Self {
            count,
            min: rows,
            max: rows * 2 - 1,
        }
    }

    /// Every field that differs from `observation`
    pub fn check(&self, observation: &Observation) -> Vec<Mismatch> {
        [
            ("cnt_id", self.count, observation.count),
            ("min_id", self.min, observation.min),
            ("max_id", self.max, observation.max),
        ]
        .into_iter()
        .filter(|(_, expected, observed)| *observed != Some(*expected))
        .map(|(field, expected, observed)| Mismatch {
            field: field.to_string(),
            expected,
            observed,
        })
        .collect()
    }
}

/// One aggregate that did not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub field: String,
    pub expected: i64,
    pub observed: Option<i64>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.observed {
            Some(observed) => write!(
                f,
                "{}: expected {}, observed {}",
                self.field, self.expected, observed
            ),
            None => write!(f, "{}: expected {}, observed nothing", self.field, self.expected),
        }
    }
}

/// Outcome of one verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Passed,
    Failed,
    /// No expectation applies; the observation is informational
    Unchecked,
}

/// Observation of one phase together with its judgement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub phase: u8,
    pub status: VerdictStatus,
    pub observation: Observation,
    pub expected: Option<Expectation>,
    pub mismatches: Vec<Mismatch>,
    /// Why no expectation was applied, or why the observation is partial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Verdict {
    /// Compare `observation` against `expected`
    pub fn checked(phase: u8, observation: Observation, expected: Expectation) -> Self {
        let mismatches = expected.check(&observation);
        let status = if mismatches.is_empty() {
            VerdictStatus::Passed
        } else {
            VerdictStatus::Failed
        };
        let note = if observation.is_complete() {
            None
        } else {
            Some("client output lacked one or more aggregate tables".to_string())
        };
        Self {
            phase,
            status,
            observation,
            expected: Some(expected),
            mismatches,
            note,
        }
    }

    /// Record `observation` without judging it
    pub fn unchecked(phase: u8, observation: Observation, note: impl Into<String>) -> Self {
        Self {
            phase,
            status: VerdictStatus::Unchecked,
            observation,
            expected: None,
            mismatches: Vec::new(),
            note: Some(note.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == VerdictStatus::Failed
    }
}
