//! One client process
//!
//! Each client owns exactly one input stream. Writes go through
//! `&mut ClientProcess` only, and every command is written as one whole
//! line into the buffer, so no stream ever sees interleaved fragments.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command as OsCommand, ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;

use super::output::OutputCapture;
use super::{describe_status, stdio_for, wait_with_timeout};
use crate::config::{HarnessConfig, OutputMode};
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event_with_fields, Event};
use crate::workload::Command;

/// Client lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientState {
    Starting,
    Open,
    Closing,
    Closed,
}

/// Where a client's stdout goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOutput {
    /// Drained into memory for verification
    Capture,
    /// Passed through or discarded
    Passthrough(OutputMode),
}

/// How to launch clients
#[derive(Debug, Clone)]
pub struct ClientLaunch {
    pub client_bin: PathBuf,
    pub work_dir: Option<PathBuf>,
    /// Output mode for clients that are not captured
    pub passthrough: OutputMode,
}

impl ClientLaunch {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            client_bin: config.client_bin.clone(),
            work_dir: config.work_dir.clone(),
            passthrough: config.client_output,
        }
    }

    /// Base OS command: the client takes no arguments
    pub(crate) fn os_command(&self) -> OsCommand {
        let mut command = OsCommand::new(&self.client_bin);
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// How a client ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientExit {
    pub index: usize,
    pub exit_code: Option<i32>,
    pub status: String,
    /// True when the client ignored `exit;` and had to be killed
    pub forced: bool,
    #[serde(skip)]
    pub output: Vec<String>,
}

impl ClientExit {
    /// The client consumed its whole stream and left on its own
    pub fn is_clean(&self) -> bool {
        !self.forced && self.exit_code == Some(0)
    }
}

/// A running client process
pub struct ClientProcess {
    index: usize,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    capture: Option<OutputCapture>,
    state: ClientState,
}

impl ClientProcess {
    /// Launch client `index`
    pub fn spawn(launch: &ClientLaunch, index: usize, output: ClientOutput) -> HarnessResult<Self> {
        let role = role_for(index);
        let mut command = launch.os_command();
        command.stdin(Stdio::piped());
        match output {
            ClientOutput::Capture => command.stdout(Stdio::piped()),
            ClientOutput::Passthrough(mode) => command.stdout(stdio_for(mode)),
        };

        let mut child = command
            .spawn()
            .map_err(|e| HarnessError::launch(role.clone(), &launch.client_bin, e))?;

        let pid = child.id().to_string();
        let mut process = Self {
            index,
            stdin: child.stdin.take().map(BufWriter::new),
            capture: None,
            state: ClientState::Starting,
            child,
        };

        if let Some(stdout) = process.child.stdout.take() {
            match OutputCapture::spawn(stdout, role.clone()) {
                Ok(capture) => process.capture = Some(capture),
                Err(e) => {
                    process.force_stop();
                    return Err(e);
                }
            }
        }

        process.state = ClientState::Open;
        log_event_with_fields(Event::ClientSpawned, &[("client", &role), ("pid", &pid)]);
        Ok(process)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// `client<index>`, as used in logs and errors
    pub fn role(&self) -> String {
        role_for(self.index)
    }

    /// Append one command to this client's buffered stream
    ///
    /// Does not wait for the client to answer.
    pub fn send(&mut self, command: &Command) -> HarnessResult<()> {
        let line = command.line();
        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(line.as_bytes()),
            None => {
                return Err(HarnessError::Invariant(format!(
                    "{} is {:?}; its stream is closed",
                    self.role(),
                    self.state
                )))
            }
        };
        result.map_err(|e| self.stream_error(e))
    }

    /// Push buffered commands into the pipe
    pub fn flush(&mut self) -> HarnessResult<()> {
        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        };
        result.map_err(|e| self.stream_error(e))
    }

    /// Fail if the client has already exited
    pub fn check_alive(&mut self) -> HarnessResult<()> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.state = ClientState::Closed;
                Err(HarnessError::premature_exit(self.role(), describe_status(&status)))
            }
            Err(e) => Err(HarnessError::io(self.role(), e)),
        }
    }

    /// A write failure on a live client is an I/O error; on a dead one it
    /// means the client quit early.
    fn stream_error(&mut self, e: io::Error) -> HarnessError {
        match self.check_alive() {
            Err(exited @ HarnessError::PrematureExit { .. }) => exited,
            _ if e.kind() == io::ErrorKind::BrokenPipe => {
                HarnessError::premature_exit(self.role(), "input stream closed by client")
            }
            _ => HarnessError::io(self.role(), e),
        }
    }

    /// Send `exit;`, close stdin, wait up to `timeout`, then force-stop
    ///
    /// Captured output is complete once this returns. A client that exits
    /// with a failure status left before consuming its whole stream, which
    /// is reported as a premature exit.
    pub fn close(mut self, timeout: Duration) -> HarnessResult<ClientExit> {
        self.state = ClientState::Closing;
        let role = self.role();

        let waited = self
            .send(&Command::exit())
            .and_then(|_| self.flush())
            .and_then(|_| self.wait_for_exit(timeout));
        let (status, forced) = match waited {
            Ok(exit) => exit,
            Err(e) => {
                self.force_stop();
                return Err(e);
            }
        };

        self.state = ClientState::Closed;
        let output = self.capture.take().map(OutputCapture::finish).unwrap_or_default();
        let status_text = describe_status(&status);

        if forced {
            log_event_with_fields(
                Event::ClientForceStopped,
                &[("client", &role), ("status", &status_text)],
            );
        } else if !status.success() {
            return Err(HarnessError::premature_exit(role, status_text));
        } else {
            log_event_with_fields(
                Event::ClientTerminated,
                &[("client", &role), ("status", &status_text)],
            );
        }

        Ok(ClientExit {
            index: self.index,
            exit_code: status.code(),
            status: status_text,
            forced,
            output,
        })
    }

    /// Close stdin and wait; kill once `timeout` passes
    fn wait_for_exit(&mut self, timeout: Duration) -> HarnessResult<(ExitStatus, bool)> {
        // EOF as well, for clients that ignore `exit;`
        drop(self.stdin.take());

        let waited = wait_with_timeout(&mut self.child, timeout)
            .map_err(|e| HarnessError::io(self.role(), e))?;
        match waited {
            Some(status) => Ok((status, false)),
            None => {
                let _ = self.child.kill();
                let status = self.child.wait().map_err(|e| HarnessError::io(self.role(), e))?;
                Ok((status, true))
            }
        }
    }

    /// Kill without ceremony; used when unwinding an aborted run
    pub fn force_stop(&mut self) {
        drop(self.stdin.take());
        if self.state != ClientState::Closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.state = ClientState::Closed;
            log_event_with_fields(
                Event::ClientForceStopped,
                &[("client", &self.role()), ("status", "killed during cleanup")],
            );
        }
        if let Some(capture) = self.capture.take() {
            capture.finish();
        }
    }
}

fn role_for(index: usize) -> String {
    format!("client{}", index)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::workload::TableSpec;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn launch_script(dir: &std::path::Path, body: &str) -> ClientLaunch {
        let script = dir.join("client.sh");
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        ClientLaunch {
            client_bin: script,
            work_dir: Some(dir.to_path_buf()),
            passthrough: OutputMode::Discard,
        }
    }

    #[test]
    fn test_close_after_clean_exit() {
        let temp_dir = TempDir::new().unwrap();
        let launch = launch_script(
            temp_dir.path(),
            "#!/bin/sh\nwhile read -r line; do echo \"$line\"; [ \"$line\" = 'exit;' ] && exit 0; done\n",
        );

        let mut client = ClientProcess::spawn(&launch, 0, ClientOutput::Capture).unwrap();
        client.send(&Command::insert(&TableSpec::new("t", "id", "int"), 1)).unwrap();
        let exit = client.close(Duration::from_secs(2)).unwrap();

        assert!(exit.is_clean());
        assert_eq!(exit.exit_code, Some(0));
        assert_eq!(exit.output, vec!["insert into t values (1);", "exit;"]);
    }

    #[test]
    fn test_failed_exit_is_premature() {
        let temp_dir = TempDir::new().unwrap();
        let launch = launch_script(
            temp_dir.path(),
            "#!/bin/sh\nsleep 0.2\nread -r line\nexit 2\n",
        );

        let mut client = ClientProcess::spawn(&launch, 1, ClientOutput::Capture).unwrap();
        client.send(&Command::insert(&TableSpec::new("t", "id", "int"), 1)).unwrap();
        let err = client.close(Duration::from_secs(2)).unwrap_err();

        assert_eq!(err.code(), "HARNESS_PREMATURE_EXIT");
        assert!(err.to_string().contains("client1"));
        assert!(err.to_string().contains("exit code 2"));
    }

    #[test]
    fn test_ignored_exit_is_forced_not_clean() {
        let temp_dir = TempDir::new().unwrap();
        let launch = launch_script(temp_dir.path(), "#!/bin/sh\nexec sleep 30\n");

        let client = ClientProcess::spawn(&launch, 0, ClientOutput::Capture).unwrap();
        let exit = client.close(Duration::from_millis(100)).unwrap();

        assert!(exit.forced);
        assert!(!exit.is_clean());
    }
}
