//! Lifecycle events reported by the harness
//!
//! Every milestone a human may want to correlate with server or client
//! logs has a typed event here.

use std::fmt;

/// Observable harness events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Run starts with a validated config
    RunStart,
    /// Controller moved to a new state
    StateTransition,
    /// Run reached Done
    RunComplete,
    /// Run aborted by a fatal error
    RunAborted,

    // Workspace
    /// Storage directory removed
    WorkspaceReset,
    /// Storage directory was already absent
    WorkspaceAbsent,
    /// Storage directory could not be removed (non-fatal)
    WorkspaceResetFailed,

    // Server
    /// Server process launched
    ServerSpawned,
    /// Server considered ready
    ServerReady,
    /// Server hard-killed
    ServerKilled,
    /// Server terminated gracefully
    ServerTerminated,
    /// Server ignored the graceful request and was force-killed
    ServerForceStopped,

    // Clients
    /// Client process launched
    ClientSpawned,
    /// Client exited after `exit;`
    ClientTerminated,
    /// Client did not exit in time and was force-stopped
    ClientForceStopped,

    // Workload
    /// DDL sent through client 0
    SchemaSent,

    // Verification
    /// Aggregate queries written to the client
    VerificationIssued,
    /// Aggregate responses parsed
    VerificationObserved,
    /// Observed values match the expectation
    VerificationPassed,
    /// Observed values differ from the expectation
    VerificationMismatch,
    /// No expectation could be applied
    VerificationUnchecked,

    // Cleanup
    /// Cleanup stack unwinding after an abort
    CleanupUnwind,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunStart => "RUN_START",
            Event::StateTransition => "STATE_TRANSITION",
            Event::RunComplete => "RUN_COMPLETE",
            Event::RunAborted => "RUN_ABORTED",

            Event::WorkspaceReset => "WORKSPACE_RESET",
            Event::WorkspaceAbsent => "WORKSPACE_ABSENT",
            Event::WorkspaceResetFailed => "WORKSPACE_RESET_FAILED",

            Event::ServerSpawned => "SERVER_SPAWNED",
            Event::ServerReady => "SERVER_READY",
            Event::ServerKilled => "SERVER_KILLED",
            Event::ServerTerminated => "SERVER_TERMINATED",
            Event::ServerForceStopped => "SERVER_FORCE_STOPPED",

            Event::ClientSpawned => "CLIENT_SPAWNED",
            Event::ClientTerminated => "CLIENT_TERMINATED",
            Event::ClientForceStopped => "CLIENT_FORCE_STOPPED",

            Event::SchemaSent => "SCHEMA_SENT",

            Event::VerificationIssued => "VERIFICATION_ISSUED",
            Event::VerificationObserved => "VERIFICATION_OBSERVED",
            Event::VerificationPassed => "VERIFICATION_PASSED",
            Event::VerificationMismatch => "VERIFICATION_MISMATCH",
            Event::VerificationUnchecked => "VERIFICATION_UNCHECKED",

            Event::CleanupUnwind => "CLEANUP_UNWIND",
        }
    }

    /// Returns true if this event indicates the run is over abnormally
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RunAborted)
    }

    /// Returns true for events that deserve a WARN line
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::WorkspaceResetFailed
                | Event::ServerForceStopped
                | Event::ClientForceStopped
                | Event::VerificationMismatch
                | Event::VerificationUnchecked
                | Event::CleanupUnwind
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
