//! Workspace reset
//!
//! Removes the server's storage directory before the first phase so the run
//! starts from an empty database. Best effort: a missing directory or a
//! permission problem is logged and reported, never raised. The controller
//! calls this once per run; phase 2 reuses whatever phase 1 left behind.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::observability::{log_event_with_fields, Event};

/// What happened to the storage directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ResetOutcome {
    /// Directory existed and was removed
    Removed,
    /// Nothing to remove
    Absent,
    /// Removal failed; the run continues
    Failed(String),
}

/// Recursively delete `storage_dir`, reporting instead of failing
pub fn reset(storage_dir: &Path) -> ResetOutcome {
    let path = storage_dir.display().to_string();

    match fs::remove_dir_all(storage_dir) {
        Ok(()) => {
            log_event_with_fields(Event::WorkspaceReset, &[("path", &path)]);
            ResetOutcome::Removed
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log_event_with_fields(Event::WorkspaceAbsent, &[("path", &path)]);
            ResetOutcome::Absent
        }
        Err(e) => {
            let reason = e.to_string();
            log_event_with_fields(
                Event::WorkspaceResetFailed,
                &[("path", &path), ("reason", &reason)],
            );
            ResetOutcome::Failed(reason)
        }
    }
}
