//! End-to-end run tests against stand-in server and client scripts
//!
//! Covers:
//! - The full state chain Init .. Done on a clean run
//! - Per-client command order and single-writer streams
//! - Phase 2 verdicts: passed, failed, unchecked after a forced client
//! - Abort paths: launch failure, server or client exiting early
//! - Workspace reset happening once per run

#![cfg(unix)]

mod support;

use std::fs;

use rmdb_harness::config::{ReadinessPolicy, VerifyPolicy};
use rmdb_harness::controller::{RunController, RunState};
use rmdb_harness::verify::VerdictStatus;
use rmdb_harness::workspace::ResetOutcome;
use tempfile::TempDir;

use support::*;

const FULL_CHAIN: [RunState; 7] = [
    RunState::Init,
    RunState::Phase1Loading,
    RunState::Phase1Verifying,
    RunState::Phase1Shutdown,
    RunState::Phase2Restart,
    RunState::Phase2Verifying,
    RunState::Done,
];

// =============================================================================
// Clean Runs
// =============================================================================

#[test]
fn test_clean_run_reaches_done_and_passes() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    set_answers(dir, "6", "3", "5");

    let controller = RunController::new(harness_config(dir, 3, 2)).unwrap();
    let report = controller.run().unwrap();

    assert_eq!(report.states, FULL_CHAIN.to_vec());
    assert_eq!(report.workload.total(), 18);
    assert_eq!(report.phase1.verdict.status, VerdictStatus::Unchecked);
    assert_eq!(report.phase2.verdict.status, VerdictStatus::Passed);
    assert_eq!(report.phase2.verdict.observation.count, Some(6));
    assert!(report.phase1.server_exit.forced);
    assert!(!report.phase2.server_exit.forced);
    assert!(report.enforce(VerifyPolicy::Enforce).is_ok());
}

#[test]
fn test_each_client_sees_its_commands_in_plan_order() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    set_answers(dir, "6", "3", "5");

    let report = RunController::new(harness_config(dir, 3, 2))
        .unwrap()
        .run()
        .unwrap();

    let workload_for = |first: &[&str]| -> Vec<String> {
        let mut expected: Vec<String> = first.iter().map(|s| s.to_string()).collect();
        expected.extend((0..3).map(|id| format!("insert into t values ({});", id)));
        expected.extend((3..6).map(|id| format!("insert into t values ({});", id)));
        expected.extend((0..3).map(|id| format!("delete from t where id={};", id)));
        expected
    };
    let selects = [
        "select count(*) as cnt_id from t;",
        "select min(*) as min_id from t;",
        "select max(*) as max_id from t;",
    ];

    // Client 0 owns the schema and the verification queries
    let mut primary = workload_for(&["create table t (id int);"]);
    primary.extend(selects.iter().map(|s| s.to_string()));
    assert_eq!(client_log(dir, report.phase1.client_pids[0]), primary);

    assert_eq!(client_log(dir, report.phase1.client_pids[1]), workload_for(&[]));

    let verifier: Vec<String> = selects.iter().map(|s| s.to_string()).collect();
    assert_eq!(client_log(dir, report.phase2.client_pids[0]), verifier);
}

#[test]
fn test_probe_readiness_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    set_answers(dir, "2", "1", "1");

    let mut config = harness_config(dir, 1, 2);
    config.readiness = ReadinessPolicy::Probe;
    config.probe_interval_ms = 200;
    config.probe_timeout_ms = 2000;

    let report = RunController::new(config).unwrap().run().unwrap();
    assert_eq!(report.phase2.verdict.status, VerdictStatus::Passed);
}

#[test]
fn test_failed_reset_does_not_stop_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    set_answers(dir, "1", "1", "1");

    // A regular file where the storage directory belongs
    let storage = dir.join("test");
    fs::write(&storage, b"not a directory").unwrap();

    let report = RunController::new(harness_config(dir, 1, 1))
        .unwrap()
        .run()
        .unwrap();

    assert!(matches!(report.workspace, ResetOutcome::Failed(_)));
    assert_eq!(report.states, FULL_CHAIN.to_vec());
    // The file survived, so neither boot could lay out its storage
    assert_eq!(fs::read(&storage).unwrap(), b"not a directory");
    assert!(server_boots(&storage).is_empty());
}

#[test]
fn test_reset_happens_once_per_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    set_answers(dir, "1", "1", "1");

    let storage = dir.join("test");
    fs::create_dir_all(&storage).unwrap();
    fs::write(storage.join("stale.db"), b"left over").unwrap();

    let report = RunController::new(harness_config(dir, 1, 1))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.workspace, ResetOutcome::Removed);
    assert!(!storage.join("stale.db").exists());
    // Phase 2 booted on what phase 1 left behind
    let boots = server_boots(&storage);
    assert_eq!(boots, vec![report.phase1.server_pid, report.phase2.server_pid]);
}

// =============================================================================
// Verdicts
// =============================================================================

#[test]
fn test_wrong_aggregates_fail_phase2() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);
    // A server that lost the deletes
    set_answers(dir, "12", "0", "5");

    let report = RunController::new(harness_config(dir, 3, 2))
        .unwrap()
        .run()
        .unwrap();

    let verdict = &report.phase2.verdict;
    assert_eq!(verdict.status, VerdictStatus::Failed);
    assert_eq!(verdict.mismatches.len(), 2);
    assert_eq!(report.failed_verdicts().len(), 1);

    assert!(report.enforce(VerifyPolicy::Report).is_ok());
    let err = report.enforce(VerifyPolicy::Enforce).unwrap_err();
    assert_eq!(err.code(), "HARNESS_VERIFICATION_FAILED");
}

#[test]
fn test_forced_client_leaves_phase2_unchecked() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT_IGNORING_EXIT);

    let mut config = harness_config(dir, 2, 2);
    config.close_timeout_ms = 200;

    let report = RunController::new(config).unwrap().run().unwrap();

    assert_eq!(report.states.last(), Some(&RunState::Done));
    assert!(report.phase1.clients.iter().all(|exit| exit.forced));
    assert_eq!(report.phase2.verdict.status, VerdictStatus::Unchecked);
    assert!(report.phase2.verdict.note.is_some());
}

#[test]
fn test_server_ignoring_sigterm_is_killed() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER_IGNORING_TERM, CLIENT);
    set_answers(dir, "1", "1", "1");

    let mut config = harness_config(dir, 1, 1);
    config.shutdown_timeout_ms = 200;

    let report = RunController::new(config).unwrap().run().unwrap();
    assert!(report.phase2.server_exit.forced);
    assert!(!process_exists(report.phase2.server_pid));
}

// =============================================================================
// Abort Paths
// =============================================================================

#[test]
fn test_missing_server_binary_aborts() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);

    let mut config = harness_config(dir, 1, 1);
    config.server_bin = dir.join("no-such-server");

    let err = RunController::new(config).unwrap().run().unwrap_err();
    assert_eq!(err.code(), "HARNESS_LAUNCH_FAILED");
    assert!(err.is_process_failure());
}

#[test]
fn test_server_exiting_before_ready_aborts() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER_DYING, CLIENT);

    let mut config = harness_config(dir, 1, 1);
    config.first_boot_settle_ms = 300;

    let err = RunController::new(config).unwrap().run().unwrap_err();
    assert_eq!(err.code(), "HARNESS_PREMATURE_EXIT");
    // No client was ever started
    assert_eq!(fs::read_dir(dir.join("clients")).unwrap().count(), 0);
}

#[test]
fn test_client_exiting_early_aborts_and_stops_server() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT_DYING);

    let err = RunController::new(harness_config(dir, 2, 2))
        .unwrap()
        .run()
        .unwrap_err();
    assert_eq!(err.code(), "HARNESS_PREMATURE_EXIT");

    let boots = server_boots(&dir.join("test"));
    assert_eq!(boots.len(), 1);
    assert!(!process_exists(boots[0]));
}

#[test]
fn test_client_failing_mid_stream_aborts() {
    for clients in [1, 2] {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        prepare_work_dir(dir, SERVER, CLIENT_CRASHING_ON_DELETE);

        let err = RunController::new(harness_config(dir, 2, clients))
            .unwrap()
            .run()
            .unwrap_err();
        assert_eq!(err.code(), "HARNESS_PREMATURE_EXIT", "clients={}", clients);
        assert!(err.to_string().contains("exit code 2"), "{}", err);

        // Phase 2 never started and the phase-1 server was stopped
        let boots = server_boots(&dir.join("test"));
        assert_eq!(boots.len(), 1);
        assert!(!process_exists(boots[0]));
    }
}

#[test]
fn test_invalid_config_is_rejected_before_launch() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    prepare_work_dir(dir, SERVER, CLIENT);

    let mut config = harness_config(dir, 1, 1);
    config.clients = 0;

    let err = RunController::new(config).err().unwrap();
    assert_eq!(err.code(), "HARNESS_CONFIG_INVALID");
    assert!(!dir.join("test").exists());
}
