//! Process lifecycle for the server and its clients
//!
//! - `server`: one server process against a storage directory
//! - `client`: one client process with its own input stream
//! - `pool`: the fixed-size set of clients of a phase
//! - `readiness`: deciding when a freshly started server may take clients
//! - `cleanup`: LIFO stack of live processes, unwound on abort
//! - `output`: background draining of a captured stdout

mod cleanup;
mod client;
mod output;
mod pool;
mod readiness;
mod server;

pub use cleanup::CleanupStack;
pub use client::{ClientExit, ClientLaunch, ClientOutput, ClientProcess, ClientState};
pub use output::OutputCapture;
pub use pool::{ClientPool, PRIMARY_CLIENT};
pub use readiness::Readiness;
pub use server::{BootKind, ServerExit, ServerHandle, ServerProcess, ServerState};

use std::io;
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::OutputMode;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `child` until it exits or `timeout` elapses
///
/// Returns `None` on timeout; the child is left running.
pub(crate) fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(started.elapsed())));
    }
}

/// Human-readable exit status: `exit code 0`, `signal 9`
pub(crate) fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }
    "unknown status".to_string()
}

pub(crate) fn stdio_for(mode: OutputMode) -> Stdio {
    match mode {
        OutputMode::Inherit => Stdio::inherit(),
        OutputMode::Discard => Stdio::null(),
    }
}
