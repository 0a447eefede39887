//! Structured JSON logger for the harness
//!
//! - One log line = one event
//! - Deterministic key ordering: event, severity, ts, run_id, then fields by key
//! - INFO and below go to stdout, ERROR and FATAL to stderr
//! - Synchronous, no buffering, so lines interleave cleanly with the
//!   server and client output sharing the terminal

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

/// Run id stamped on every line once a run has started
static RUN_ID: Mutex<Option<String>> = Mutex::new(None);

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Normal lifecycle milestones
    Info = 0,
    /// Non-fatal problems (workspace reset failures, verification mismatches in report mode)
    Warn = 1,
    /// Operation failures
    Error = 2,
    /// Run aborted
    Fatal = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Attach a run id to every subsequent line
    pub fn set_run_id(run_id: &str) {
        if let Ok(mut guard) = RUN_ID.lock() {
            *guard = Some(run_id.to_string());
        }
    }

    /// Stop stamping lines with a run id
    pub fn clear_run_id() {
        if let Ok(mut guard) = RUN_ID.lock() {
            *guard = None;
        }
    }

    fn current_run_id() -> Option<String> {
        RUN_ID.lock().ok().and_then(|guard| guard.clone())
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let run_id = Self::current_run_id();
        if severity >= Severity::Error {
            Self::log_to_writer(severity, event, &ts, run_id.as_deref(), fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, &ts, run_id.as_deref(), fields, &mut io::stdout());
        }
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        ts: &str,
        run_id: Option<&str>,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut output = String::with_capacity(256);

        output.push_str("{\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push_str("\",\"ts\":\"");
        Self::escape_json_string(&mut output, ts);
        output.push('"');

        if let Some(run_id) = run_id {
            output.push_str(",\"run_id\":\"");
            Self::escape_json_string(&mut output, run_id);
            output.push('"');
        }

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");

        // One write per line
        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Capture a log line into a string for testing
#[cfg(test)]
pub fn capture_log(
    severity: Severity,
    event: &str,
    run_id: Option<&str>,
    fields: &[(&str, &str)],
) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(
        severity,
        event,
        "2026-01-01T00:00:00.000Z",
        run_id,
        fields,
        &mut buffer,
    );
    String::from_utf8(buffer).unwrap()
}
