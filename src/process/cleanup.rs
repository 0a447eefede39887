//! Explicit cleanup stack of live processes
//!
//! Every process the controller starts is pushed here and taken off again
//! when it is stopped on the normal path. If the run aborts, `unwind`
//! force-stops whatever is still on the stack, newest first.
//!
//! The stack shape also carries the lifecycle ordering rules:
//! - a client pool may only be pushed on top of a Ready server
//! - at most one server is on the stack at a time
//! - the server may only be taken once no pool sits above it

use super::pool::ClientPool;
use super::server::ServerProcess;
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event_with_fields, Event};

enum Resource {
    Server(ServerProcess),
    Clients(ClientPool),
}

impl Resource {
    fn label(&self) -> &'static str {
        match self {
            Resource::Server(_) => "server",
            Resource::Clients(_) => "clients",
        }
    }
}

/// LIFO stack of processes that must be stopped on any exit path
#[derive(Default)]
pub struct CleanupStack {
    entries: Vec<Resource>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn has_server(&self) -> bool {
        self.entries.iter().any(|r| matches!(r, Resource::Server(_)))
    }

    /// Register a freshly started server
    pub fn push_server(&mut self, server: ServerProcess) -> HarnessResult<()> {
        if self.has_server() {
            let mut server = server;
            server.force_stop();
            return Err(HarnessError::Invariant(
                "a second server was started against the storage directory".into(),
            ));
        }
        self.entries.push(Resource::Server(server));
        Ok(())
    }

    /// Register a client pool above a Ready server
    pub fn push_clients(&mut self, pool: ClientPool) -> HarnessResult<()> {
        let server_ready = matches!(
            self.entries.last(),
            Some(Resource::Server(server)) if server.is_ready()
        );
        if !server_ready {
            pool.force_stop_all();
            return Err(HarnessError::Invariant(
                "clients may only be spawned once the server is ready".into(),
            ));
        }
        self.entries.push(Resource::Clients(pool));
        Ok(())
    }

    /// The live server
    pub fn server_mut(&mut self) -> HarnessResult<&mut ServerProcess> {
        self.entries
            .iter_mut()
            .find_map(|r| match r {
                Resource::Server(server) => Some(server),
                Resource::Clients(_) => None,
            })
            .ok_or_else(|| HarnessError::Invariant("no server is running".into()))
    }

    /// The live client pool
    pub fn clients_mut(&mut self) -> HarnessResult<&mut ClientPool> {
        match self.entries.last_mut() {
            Some(Resource::Clients(pool)) => Ok(pool),
            _ => Err(HarnessError::Invariant("no client pool is open".into())),
        }
    }

    /// Take the pool off the stack to close it
    pub fn take_clients(&mut self) -> HarnessResult<ClientPool> {
        match self.entries.pop() {
            Some(Resource::Clients(pool)) => Ok(pool),
            Some(other) => {
                self.entries.push(other);
                Err(HarnessError::Invariant("no client pool is open".into()))
            }
            None => Err(HarnessError::Invariant("no client pool is open".into())),
        }
    }

    /// Take the server off the stack to stop it
    ///
    /// Refused while clients are still registered above it.
    pub fn take_server(&mut self) -> HarnessResult<ServerProcess> {
        match self.entries.pop() {
            Some(Resource::Server(server)) => Ok(server),
            Some(other) => {
                self.entries.push(other);
                Err(HarnessError::Invariant(
                    "the server cannot stop while clients are open".into(),
                ))
            }
            None => Err(HarnessError::Invariant("no server is running".into())),
        }
    }

    /// Force-stop everything still registered, newest first
    pub fn unwind(&mut self) {
        while let Some(resource) = self.entries.pop() {
            log_event_with_fields(Event::CleanupUnwind, &[("resource", resource.label())]);
            match resource {
                Resource::Clients(pool) => pool.force_stop_all(),
                Resource::Server(mut server) => server.force_stop(),
            }
        }
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        // Backstop; the controller unwinds explicitly
        self.unwind();
    }
}
