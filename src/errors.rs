//! Harness error types
//!
//! Error codes:
//! - HARNESS_LAUNCH_FAILED (FATAL)
//! - HARNESS_PREMATURE_EXIT (FATAL)
//! - HARNESS_IO_ERROR (FATAL)
//! - HARNESS_NOT_READY (FATAL)
//! - HARNESS_CONFIG_INVALID (FATAL)
//! - HARNESS_INVARIANT_VIOLATED (FATAL)
//! - HARNESS_VERIFICATION_FAILED (FATAL, enforce mode only)
//!
//! A failed workspace reset is deliberately absent: it is a logged
//! outcome, not an error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Harness errors. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to launch {role} ({path}): {source}")]
    Launch {
        role: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{role} exited before the harness expected it to ({status})")]
    PrematureExit { role: String, status: String },

    #[error("I/O error on {role}: {source}")]
    Io {
        role: String,
        #[source]
        source: io::Error,
    },

    #[error("server not ready after {waited_ms}ms: {reason}")]
    NotReady { waited_ms: u64, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("lifecycle invariant violated: {0}")]
    Invariant(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

impl HarnessError {
    /// Launch failure for the given role
    pub fn launch(role: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Launch {
            role: role.into(),
            path: path.into(),
            source,
        }
    }

    /// Process exited while still needed
    pub fn premature_exit(role: impl Into<String>, status: impl Into<String>) -> Self {
        Self::PrematureExit {
            role: role.into(),
            status: status.into(),
        }
    }

    /// Stream or wait failure for the given role
    pub fn io(role: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            role: role.into(),
            source,
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::Launch { .. } => "HARNESS_LAUNCH_FAILED",
            HarnessError::PrematureExit { .. } => "HARNESS_PREMATURE_EXIT",
            HarnessError::Io { .. } => "HARNESS_IO_ERROR",
            HarnessError::NotReady { .. } => "HARNESS_NOT_READY",
            HarnessError::Config(_) => "HARNESS_CONFIG_INVALID",
            HarnessError::Invariant(_) => "HARNESS_INVARIANT_VIOLATED",
            HarnessError::VerificationFailed(_) => "HARNESS_VERIFICATION_FAILED",
        }
    }

    /// True for errors that mean a collaborator process misbehaved,
    /// as opposed to a harness-side misconfiguration.
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::Launch { .. }
                | HarnessError::PrematureExit { .. }
                | HarnessError::Io { .. }
                | HarnessError::NotReady { .. }
        )
    }
}
