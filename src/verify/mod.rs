//! Verification through aggregate queries
//!
//! The verifier writes `count`, `min` and `max` queries to the primary
//! client and later parses that client's captured output. It never waits
//! for answers itself: output is only complete once the client has been
//! closed, which the controller does.

mod expectation;
mod table;

pub use expectation::{Expectation, Mismatch, Verdict, VerdictStatus};
pub use table::{parse_integer, row_cells, value_for_alias};

use serde::Serialize;

use crate::errors::HarnessResult;
use crate::observability::{log_event_with_fields, Event};
use crate::process::ClientPool;
use crate::workload::{Aggregate, Command, TableSpec};

pub const COUNT_ALIAS: &str = "cnt_id";
pub const MIN_ALIAS: &str = "min_id";
pub const MAX_ALIAS: &str = "max_id";

const ALIASES: [&str; 3] = [COUNT_ALIAS, MIN_ALIAS, MAX_ALIAS];

/// Aggregates parsed from one client's output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub count: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// `alias = raw cell` for every alias that had a value
    pub evidence: Vec<String>,
}

impl Observation {
    /// Parse the aggregate tables out of captured client output
    pub fn parse(lines: &[String]) -> Self {
        let mut observation = Observation::default();

        for alias in ALIASES {
            let raw = value_for_alias(lines, alias, &ALIASES);
            let value = raw.as_deref().and_then(parse_integer);
            if let Some(raw) = raw {
                observation.evidence.push(format!("{} = {}", alias, raw));
            }
            match alias {
                COUNT_ALIAS => observation.count = value,
                MIN_ALIAS => observation.min = value,
                _ => observation.max = value,
            }
        }

        observation
    }

    /// All three aggregates were found
    pub fn is_complete(&self) -> bool {
        self.count.is_some() && self.min.is_some() && self.max.is_some()
    }
}

/// Issues the verification queries and reads their answers
#[derive(Debug, Clone)]
pub struct Verifier {
    queries: Vec<Command>,
}

impl Verifier {
    pub fn new(table: &TableSpec) -> Self {
        Self {
            queries: vec![
                Command::aggregate(table, Aggregate::Count, COUNT_ALIAS),
                Command::aggregate(table, Aggregate::Min, MIN_ALIAS),
                Command::aggregate(table, Aggregate::Max, MAX_ALIAS),
            ],
        }
    }

    /// The three read-only queries, in send order
    pub fn queries(&self) -> &[Command] {
        &self.queries
    }

    /// Write the queries to the primary client
    pub fn issue(&self, pool: &mut ClientPool, phase: u8) -> HarnessResult<()> {
        for query in &self.queries {
            pool.send_primary(query)?;
        }
        pool.flush()?;
        log_event_with_fields(
            Event::VerificationIssued,
            &[("phase", &phase.to_string()), ("queries", &self.queries.len().to_string())],
        );
        Ok(())
    }

    /// Parse the primary client's output after it has been closed
    pub fn observe(&self, output: &[String], phase: u8) -> Observation {
        let observation = Observation::parse(output);
        let phase = phase.to_string();
        let count = format_value(observation.count);
        let min = format_value(observation.min);
        let max = format_value(observation.max);
        log_event_with_fields(
            Event::VerificationObserved,
            &[
                ("phase", &phase),
                (COUNT_ALIAS, &count),
                (MIN_ALIAS, &min),
                (MAX_ALIAS, &max),
                ("lines", &output.len().to_string()),
            ],
        );
        observation
    }

    /// Log a verdict at the matching severity
    pub fn report(&self, verdict: &Verdict) {
        let phase = verdict.phase.to_string();
        match verdict.status {
            VerdictStatus::Passed => {
                log_event_with_fields(Event::VerificationPassed, &[("phase", &phase)]);
            }
            VerdictStatus::Failed => {
                for mismatch in &verdict.mismatches {
                    log_event_with_fields(
                        Event::VerificationMismatch,
                        &[("phase", &phase), ("detail", &mismatch.to_string())],
                    );
                }
            }
            VerdictStatus::Unchecked => {
                let note = verdict.note.as_deref().unwrap_or("");
                log_event_with_fields(
                    Event::VerificationUnchecked,
                    &[("phase", &phase), ("note", note)],
                );
            }
        }
    }
}

fn format_value(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
