//! Two-phase run controller
//!
//! Phase 1 loads the server through n clients and kills it. Phase 2
//! restarts it on the same storage directory and reads the aggregates back
//! through a single client.
//!
//! The controller is a single sequential thread. Concurrency comes only
//! from the client and server processes running side by side once commands
//! are in their pipes. Every process it starts goes onto a `CleanupStack`;
//! when any step fails the stack is unwound before the error propagates.

mod report;
mod state;

pub use report::{PhaseReport, RunReport};
pub use state::RunState;

use chrono::Utc;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event_with_fields, Event, Logger, ObservationScope};
use crate::process::{
    BootKind, CleanupStack, ClientExit, ClientLaunch, ClientPool, Readiness, ServerHandle,
    PRIMARY_CLIENT,
};
use crate::verify::{Expectation, Verdict, Verifier};
use crate::workload::{DriveSummary, WorkloadDriver, WorkloadPlan};
use crate::workspace::{self, ResetOutcome};

/// Everything phase 1 hands over to phase 2
struct Phase1Outcome {
    workspace: ResetOutcome,
    workload: DriveSummary,
    report: PhaseReport,
}

/// Drives one complete run
pub struct RunController {
    config: HarnessConfig,
    run_id: Uuid,
    state: RunState,
    history: Vec<RunState>,
    resources: CleanupStack,
    server: ServerHandle,
    readiness: Readiness,
    launch: ClientLaunch,
    plan: WorkloadPlan,
    verifier: Verifier,
}

impl RunController {
    /// Validate `config` and prepare a run
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;

        let plan = WorkloadPlan::from_config(&config);
        let verifier = Verifier::new(plan.table());

        Ok(Self {
            run_id: Uuid::new_v4(),
            state: RunState::Init,
            history: vec![RunState::Init],
            resources: CleanupStack::new(),
            server: ServerHandle::from_config(&config),
            readiness: Readiness::from_config(&config),
            launch: ClientLaunch::from_config(&config),
            plan,
            verifier,
            config,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn plan(&self) -> &WorkloadPlan {
        &self.plan
    }

    /// Run both phases
    ///
    /// Returns the report once the run reaches Done. Any launch failure or
    /// premature exit unwinds every live process and aborts the run.
    pub fn run(mut self) -> HarnessResult<RunReport> {
        let run_id = self.run_id.to_string();
        Logger::set_run_id(&run_id);
        log_event_with_fields(
            Event::RunStart,
            &[
                ("rows", &self.config.rows.to_string()),
                ("clients", &self.config.clients.to_string()),
                ("storage_dir", &self.config.storage_path().display().to_string()),
            ],
        );

        let started_at = Utc::now();
        let result = self.execute(started_at);

        match &result {
            Ok(_) => log_event_with_fields(Event::RunComplete, &[]),
            Err(e) => self.abort(e),
        }
        Logger::clear_run_id();
        result
    }

    fn execute(&mut self, started_at: chrono::DateTime<Utc>) -> HarnessResult<RunReport> {
        let phase1 = self.phase1()?;
        let phase2 = self.phase2(&phase1.report.clients)?;

        Ok(RunReport {
            run_id: self.run_id,
            started_at,
            finished_at: Utc::now(),
            rows: self.config.rows,
            clients: self.config.clients,
            storage_dir: self.config.storage_path().display().to_string(),
            workspace: phase1.workspace,
            states: self.history.clone(),
            workload: phase1.workload,
            phase1: phase1.report,
            phase2,
        })
    }

    /// Init through Phase1Shutdown, ending with the server killed
    fn phase1(&mut self) -> HarnessResult<Phase1Outcome> {
        let scope = ObservationScope::new("PHASE1");

        // Init: the only reset of the run
        let workspace = workspace::reset(&self.config.storage_path());
        let server_pid = self.boot(BootKind::First)?;

        let pool = ClientPool::spawn(&self.launch, self.config.clients)?;
        let client_pids = pool.pids();
        self.resources.push_clients(pool)?;

        WorkloadDriver::new(&self.plan)
            .send_schema(self.resources.clients_mut()?, self.config.ddl_settle())?;
        self.transition(RunState::Phase1Loading)?;

        let workload = WorkloadDriver::new(&self.plan).drive(self.resources.clients_mut()?)?;
        self.transition(RunState::Phase1Verifying)?;

        self.verifier.issue(self.resources.clients_mut()?, 1)?;
        self.transition(RunState::Phase1Shutdown)?;

        // Every client must be gone before the server is touched
        let clients = self.resources.take_clients()?.close_all(self.config.close_timeout())?;
        let server = self.resources.take_server()?;
        let server_exit = self.server.kill(server)?;

        let verdict = Verdict::unchecked(
            1,
            self.verifier.observe(primary_output(&clients), 1),
            "queried while other clients may still have been loading",
        );
        self.verifier.report(&verdict);

        scope.complete();
        Ok(Phase1Outcome {
            workspace,
            workload,
            report: PhaseReport {
                phase: 1,
                server_pid,
                client_pids,
                clients,
                server_exit,
                verdict,
            },
        })
    }

    /// Phase2Restart through Done, ending with a graceful server shutdown
    fn phase2(&mut self, phase1_clients: &[ClientExit]) -> HarnessResult<PhaseReport> {
        self.transition(RunState::Phase2Restart)?;
        let scope = ObservationScope::new("PHASE2");

        let server_pid = self.boot(BootKind::Recovery)?;
        let pool = ClientPool::spawn(&self.launch, 1)?;
        let client_pids = pool.pids();
        self.resources.push_clients(pool)?;
        self.transition(RunState::Phase2Verifying)?;

        self.verifier.issue(self.resources.clients_mut()?, 2)?;
        let clients = self.resources.take_clients()?.close_all(self.config.close_timeout())?;
        let server = self.resources.take_server()?;
        let server_exit = self.server.terminate(server)?;

        let observation = self.verifier.observe(primary_output(&clients), 2);
        let verdict = match phase1_clients.iter().find(|exit| !exit.is_clean()) {
            None => Verdict::checked(
                2,
                observation,
                Expectation::after_workload(
                    self.config.rows,
                    self.config.clients,
                    self.config.count_mode,
                ),
            ),
            Some(exit) => Verdict::unchecked(
                2,
                observation,
                format!(
                    "client{} was force-stopped in phase 1; acknowledged state unknown",
                    exit.index
                ),
            ),
        };
        self.verifier.report(&verdict);
        self.transition(RunState::Done)?;

        scope.complete();
        Ok(PhaseReport {
            phase: 2,
            server_pid,
            client_pids,
            clients,
            server_exit,
            verdict,
        })
    }

    /// Start the server, register it, and wait until it counts as ready
    fn boot(&mut self, boot: BootKind) -> HarnessResult<u32> {
        let server = self.server.start(&self.config.storage_path(), boot)?;
        let pid = server.pid();
        self.resources.push_server(server)?;

        self.readiness.await_ready(self.resources.server_mut()?)?;
        Ok(pid)
    }

    fn transition(&mut self, target: RunState) -> HarnessResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(HarnessError::Invariant(format!(
                "illegal transition {} -> {}",
                self.state, target
            )));
        }
        log_event_with_fields(
            Event::StateTransition,
            &[("from", self.state.as_str()), ("to", target.as_str())],
        );
        self.state = target;
        self.history.push(target);
        Ok(())
    }

    fn abort(&mut self, error: &HarnessError) {
        self.resources.unwind();
        let from = self.state;
        let phase = from.phase().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        if self.transition(RunState::Aborted).is_err() {
            // Already terminal; record the abort anyway
            self.state = RunState::Aborted;
            self.history.push(RunState::Aborted);
        }
        log_event_with_fields(
            Event::RunAborted,
            &[
                ("code", error.code()),
                ("phase", &phase),
                ("reason", &error.to_string()),
                ("state", from.as_str()),
            ],
        );
    }
}

/// Captured output of the primary client, empty if it was not captured
fn primary_output(exits: &[ClientExit]) -> &[String] {
    exits
        .iter()
        .find(|exit| exit.index == PRIMARY_CLIENT)
        .map(|exit| exit.output.as_slice())
        .unwrap_or(&[])
}
