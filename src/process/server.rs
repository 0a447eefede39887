//! The database server process
//!
//! The server is launched as `<server_bin> <storage_dir>` and nothing it
//! prints is parsed. Two ways to stop it:
//!
//! - `kill`: SIGKILL, no chance to persist anything. Phase 1 ends this way
//!   so phase 2 exercises recovery from a non-graceful stop.
//! - `terminate`: SIGTERM, bounded wait, SIGKILL if ignored. Only used once
//!   every client is closed.

use std::path::{Path, PathBuf};
use std::process::{Child, Command as OsCommand, Stdio};
use std::time::Duration;

use serde::Serialize;

use super::{describe_status, stdio_for, wait_with_timeout};
use crate::config::{HarnessConfig, OutputMode};
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event_with_fields, Event};

const ROLE: &str = "server";

/// Server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    Starting,
    Ready,
    Terminating,
    Dead,
}

/// Which boot this is; recovery boots replay prior state and settle longer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootKind {
    First,
    Recovery,
}

impl BootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootKind::First => "first",
            BootKind::Recovery => "recovery",
        }
    }
}

/// How the server ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerExit {
    pub status: String,
    /// True when a graceful terminate had to escalate to a kill
    pub forced: bool,
}

/// A running server process
pub struct ServerProcess {
    boot: BootKind,
    child: Child,
    state: ServerState,
}

impl ServerProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn boot(&self) -> BootKind {
        self.boot
    }

    pub fn is_ready(&self) -> bool {
        self.state == ServerState::Ready
    }

    pub(crate) fn mark_ready(&mut self) {
        self.state = ServerState::Ready;
        log_event_with_fields(
            Event::ServerReady,
            &[("boot", self.boot.as_str()), ("pid", &self.pid().to_string())],
        );
    }

    /// Fail if the server has already exited
    pub fn check_alive(&mut self) -> HarnessResult<()> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.state = ServerState::Dead;
                Err(HarnessError::premature_exit(ROLE, describe_status(&status)))
            }
            Err(e) => Err(HarnessError::io(ROLE, e)),
        }
    }

    /// SIGKILL and reap, ignoring errors; used when unwinding an aborted run
    pub fn force_stop(&mut self) {
        if self.state == ServerState::Dead {
            return;
        }
        let _ = self.child.kill();
        let status = self
            .child
            .wait()
            .map(|s| describe_status(&s))
            .unwrap_or_else(|e| e.to_string());
        self.state = ServerState::Dead;
        log_event_with_fields(
            Event::ServerForceStopped,
            &[("pid", &self.pid().to_string()), ("status", &status)],
        );
    }
}

/// Launches and stops server processes
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_bin: PathBuf,
    work_dir: Option<PathBuf>,
    output: OutputMode,
    shutdown_timeout: Duration,
}

impl ServerHandle {
    pub fn new(
        server_bin: impl Into<PathBuf>,
        work_dir: Option<PathBuf>,
        output: OutputMode,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            server_bin: server_bin.into(),
            work_dir,
            output,
            shutdown_timeout,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            &config.server_bin,
            config.work_dir.clone(),
            config.server_output,
            config.shutdown_timeout(),
        )
    }

    /// Launch the server against `storage_dir`
    ///
    /// The process starts in `Starting`; readiness is decided separately.
    pub fn start(&self, storage_dir: &Path, boot: BootKind) -> HarnessResult<ServerProcess> {
        let mut command = OsCommand::new(&self.server_bin);
        command
            .arg(storage_dir)
            .stdin(Stdio::null())
            .stdout(stdio_for(self.output))
            .stderr(stdio_for(self.output));
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| HarnessError::launch(ROLE, &self.server_bin, e))?;

        let server = ServerProcess {
            boot,
            child,
            state: ServerState::Starting,
        };

        log_event_with_fields(
            Event::ServerSpawned,
            &[
                ("boot", boot.as_str()),
                ("pid", &server.pid().to_string()),
                ("storage_dir", &storage_dir.display().to_string()),
            ],
        );
        Ok(server)
    }

    /// Forced, immediate termination
    ///
    /// A server that already died is reported as a premature exit: the
    /// harness can no longer tell what it persisted.
    pub fn kill(&self, server: ServerProcess) -> HarnessResult<ServerExit> {
        stop_or_force(server, |server| {
            server.check_alive()?;
            server.state = ServerState::Terminating;
            server.child.kill().map_err(|e| HarnessError::io(ROLE, e))?;
            let status = server.child.wait().map_err(|e| HarnessError::io(ROLE, e))?;
            server.state = ServerState::Dead;

            let status = describe_status(&status);
            log_event_with_fields(
                Event::ServerKilled,
                &[("pid", &server.pid().to_string()), ("status", &status)],
            );
            Ok(ServerExit {
                status,
                forced: true,
            })
        })
    }

    /// Graceful shutdown, escalating to a kill after the shutdown timeout
    pub fn terminate(&self, server: ServerProcess) -> HarnessResult<ServerExit> {
        stop_or_force(server, |server| {
            server.check_alive()?;
            server.state = ServerState::Terminating;
            request_shutdown(&mut server.child)?;

            let waited = wait_with_timeout(&mut server.child, self.shutdown_timeout)
                .map_err(|e| HarnessError::io(ROLE, e))?;
            let (status, forced) = match waited {
                Some(status) => (status, false),
                None => {
                    server.child.kill().map_err(|e| HarnessError::io(ROLE, e))?;
                    let status = server.child.wait().map_err(|e| HarnessError::io(ROLE, e))?;
                    (status, true)
                }
            };
            server.state = ServerState::Dead;

            let status = describe_status(&status);
            let event = if forced {
                Event::ServerForceStopped
            } else {
                Event::ServerTerminated
            };
            log_event_with_fields(
                event,
                &[("pid", &server.pid().to_string()), ("status", &status)],
            );
            Ok(ServerExit { status, forced })
        })
    }
}

/// Run `stop` on a server that is off the cleanup stack; if it fails, the
/// process is force-stopped before the error is returned.
fn stop_or_force<F>(mut server: ServerProcess, stop: F) -> HarnessResult<ServerExit>
where
    F: FnOnce(&mut ServerProcess) -> HarnessResult<ServerExit>,
{
    let result = stop(&mut server);
    if result.is_err() {
        server.force_stop();
    }
    result
}

#[cfg(unix)]
fn request_shutdown(child: &mut Child) -> HarnessResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(child.id() as i32);
    kill(pid, Signal::SIGTERM).map_err(|errno| HarnessError::io(ROLE, errno.into()))
}

#[cfg(not(unix))]
fn request_shutdown(child: &mut Child) -> HarnessResult<()> {
    child.kill().map_err(|e| HarnessError::io(ROLE, e))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn sleeping_server(dir: &Path) -> ServerHandle {
        let script = dir.join("server.sh");
        fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        ServerHandle::new(script, None, OutputMode::Discard, Duration::from_secs(2))
    }

    fn exists(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[test]
    fn test_failed_stop_still_stops_the_process() {
        let temp_dir = TempDir::new().unwrap();
        let handle = sleeping_server(temp_dir.path());
        let server = handle.start(&temp_dir.path().join("db"), BootKind::First).unwrap();
        let pid = server.pid();

        let err = stop_or_force(server, |_| {
            Err(HarnessError::io(ROLE, std::io::Error::from_raw_os_error(3)))
        })
        .unwrap_err();

        assert_eq!(err.code(), "HARNESS_IO_ERROR");
        assert!(!exists(pid));
    }

    #[test]
    fn test_kill_and_terminate() {
        let temp_dir = TempDir::new().unwrap();
        let handle = sleeping_server(temp_dir.path());
        let storage = temp_dir.path().join("db");

        let server = handle.start(&storage, BootKind::First).unwrap();
        let exit = handle.kill(server).unwrap();
        assert!(exit.forced);
        assert_eq!(exit.status, "signal 9");

        let server = handle.start(&storage, BootKind::Recovery).unwrap();
        let pid = server.pid();
        let exit = handle.terminate(server).unwrap();
        assert!(!exit.forced);
        assert_eq!(exit.status, "signal 15");
        assert!(!exists(pid));
    }

    #[test]
    fn test_stopping_a_dead_server_is_premature() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("server.sh");
        fs::write(&script, "#!/bin/sh\nexit 4\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let handle = ServerHandle::new(script, None, OutputMode::Discard, Duration::from_secs(2));

        let mut server = handle.start(&temp_dir.path().join("db"), BootKind::First).unwrap();
        while server.check_alive().is_ok() {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(server.state(), ServerState::Dead);

        let err = handle.kill(server).unwrap_err();
        assert_eq!(err.code(), "HARNESS_PREMATURE_EXIT");
    }
}
