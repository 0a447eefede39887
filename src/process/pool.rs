//! The clients of one phase
//!
//! Indices are assigned at spawn and never change. Client 0 is the only
//! one that sends DDL and verification queries, and the only one whose
//! stdout is captured.

use std::time::Duration;

use super::client::{ClientExit, ClientLaunch, ClientOutput, ClientProcess};
use crate::errors::{HarnessError, HarnessResult};
use crate::workload::Command;

/// Index of the client that runs DDL and verification
pub const PRIMARY_CLIENT: usize = 0;

/// A fixed-size set of client processes
pub struct ClientPool {
    clients: Vec<ClientProcess>,
}

impl ClientPool {
    /// Launch `n` clients, capturing the primary client's stdout
    ///
    /// If any launch fails, the clients already started are stopped before
    /// the error is returned.
    pub fn spawn(launch: &ClientLaunch, n: usize) -> HarnessResult<Self> {
        if n == 0 {
            return Err(HarnessError::Invariant("a client pool needs at least one client".into()));
        }

        let mut clients = Vec::with_capacity(n);
        for index in 0..n {
            let output = if index == PRIMARY_CLIENT {
                ClientOutput::Capture
            } else {
                ClientOutput::Passthrough(launch.passthrough)
            };
            match ClientProcess::spawn(launch, index, output) {
                Ok(client) => clients.push(client),
                Err(e) => {
                    for client in clients.iter_mut().rev() {
                        client.force_stop();
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self { clients })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.clients.iter().map(ClientProcess::pid).collect()
    }

    fn client_mut(&mut self, index: usize) -> HarnessResult<&mut ClientProcess> {
        let len = self.clients.len();
        self.clients.get_mut(index).ok_or_else(|| {
            HarnessError::Invariant(format!("no client{} in a pool of {}", index, len))
        })
    }

    /// Buffer `command` on client `index`'s stream
    pub fn send(&mut self, index: usize, command: &Command) -> HarnessResult<()> {
        self.client_mut(index)?.send(command)
    }

    /// Buffer `command` on the primary client's stream
    pub fn send_primary(&mut self, command: &Command) -> HarnessResult<()> {
        self.send(PRIMARY_CLIENT, command)
    }

    /// Push every client's buffered commands into its pipe
    pub fn flush(&mut self) -> HarnessResult<()> {
        for client in &mut self.clients {
            client.flush()?;
        }
        Ok(())
    }

    /// Fail if any client has exited on its own
    pub fn check_alive(&mut self) -> HarnessResult<()> {
        for client in &mut self.clients {
            client.check_alive()?;
        }
        Ok(())
    }

    /// Close every client in index order
    ///
    /// Each client gets `exit;` and up to `timeout` to leave before it is
    /// force-stopped. On error the remaining clients are force-stopped so
    /// the server can be shut down safely.
    pub fn close_all(self, timeout: Duration) -> HarnessResult<Vec<ClientExit>> {
        let mut exits = Vec::with_capacity(self.clients.len());
        let mut remaining = self.clients.into_iter();

        while let Some(client) = remaining.next() {
            match client.close(timeout) {
                Ok(exit) => exits.push(exit),
                Err(e) => {
                    for mut client in remaining {
                        client.force_stop();
                    }
                    return Err(e);
                }
            }
        }

        Ok(exits)
    }

    /// Kill every client, newest first
    pub fn force_stop_all(mut self) {
        for client in self.clients.iter_mut().rev() {
            client.force_stop();
        }
    }
}
