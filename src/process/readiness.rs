//! Deciding when a started server may take clients
//!
//! The server never announces readiness. Two policies:
//!
//! - `Fixed`: sleep a settling delay (longer for a recovery boot).
//! - `Probe`: launch throwaway clients that send `exit;` until one exits
//!   successfully, polling at a fixed interval up to a deadline.
//!
//! Either way the server must still be alive afterwards; a server that
//! died while settling is a premature exit.

use std::io::Write;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

use super::client::ClientLaunch;
use super::server::{BootKind, ServerProcess};
use super::wait_with_timeout;
use crate::config::{HarnessConfig, ReadinessPolicy};
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::Logger;
use crate::workload::Command;

/// Readiness policy with its timings
#[derive(Debug, Clone)]
pub struct Readiness {
    policy: ReadinessPolicy,
    first_boot_settle: Duration,
    recovery_settle: Duration,
    probe_interval: Duration,
    probe_timeout: Duration,
    probe_client: ClientLaunch,
}

impl Readiness {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            policy: config.readiness,
            first_boot_settle: config.first_boot_settle(),
            recovery_settle: config.recovery_settle(),
            probe_interval: Duration::from_millis(config.probe_interval_ms),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            probe_client: ClientLaunch::from_config(config),
        }
    }

    pub fn policy(&self) -> ReadinessPolicy {
        self.policy
    }

    /// Settling delay for a boot kind
    pub fn settle_for(&self, boot: BootKind) -> Duration {
        match boot {
            BootKind::First => self.first_boot_settle,
            BootKind::Recovery => self.recovery_settle,
        }
    }

    /// Block until `server` counts as Ready
    pub fn await_ready(&self, server: &mut ServerProcess) -> HarnessResult<()> {
        match self.policy {
            ReadinessPolicy::Fixed => {
                thread::sleep(self.settle_for(server.boot()));
                server.check_alive()?;
            }
            ReadinessPolicy::Probe => self.probe(server)?,
        }
        server.mark_ready();
        Ok(())
    }

    fn probe(&self, server: &mut ServerProcess) -> HarnessResult<()> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            server.check_alive()?;
            attempts += 1;
            let remaining = self.probe_timeout.saturating_sub(started.elapsed());
            if self.handshake(remaining.max(self.probe_interval))? {
                Logger::info(
                    "READINESS_PROBE_SUCCEEDED",
                    &[
                        ("attempts", &attempts.to_string()),
                        ("elapsed_ms", &started.elapsed().as_millis().to_string()),
                    ],
                );
                return Ok(());
            }
            if started.elapsed() >= self.probe_timeout {
                return Err(HarnessError::NotReady {
                    waited_ms: started.elapsed().as_millis() as u64,
                    reason: format!("{} probe clients failed to connect", attempts),
                });
            }
            thread::sleep(self.probe_interval);
        }
    }

    /// One throwaway client: connect, `exit;`, and report whether it left
    /// cleanly within `timeout`
    ///
    /// A client that cannot even be launched is fatal; a client that
    /// cannot reach the server just fails the attempt.
    fn handshake(&self, timeout: Duration) -> HarnessResult<bool> {
        let mut child = self
            .probe_client
            .os_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarnessError::launch("probe client", &self.probe_client.client_bin, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A client that already gave up closes its end; that is a failed attempt
            let _ = stdin.write_all(Command::exit().line().as_bytes());
        }

        match wait_with_timeout(&mut child, timeout) {
            Ok(Some(status)) => Ok(status.success()),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                Ok(false)
            }
            Err(e) => Err(HarnessError::io("probe client", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_for_boot_kind() {
        let readiness = Readiness::from_config(&HarnessConfig::default());
        assert_eq!(readiness.policy(), ReadinessPolicy::Fixed);
        assert_eq!(readiness.settle_for(BootKind::First), Duration::from_millis(500));
        assert_eq!(readiness.settle_for(BootKind::Recovery), Duration::from_millis(1000));
    }
}
