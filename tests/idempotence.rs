//! Idempotence of node and schema operations
//!
//! Running an operation a second time against the state the first run
//! produced must not issue another mutating command.

use serde_json::{json, Value};

use cassandra_ops::connection::ConnectionConfig;
use cassandra_ops::cql::session::row;
use cassandra_ops::cql::{ensure_keyspace, ensure_role, KeyspaceRequest, MemorySession, RoleRequest};
use cassandra_ops::executor::MockExecutor;
use cassandra_ops::nodetool::{DesiredState, Nodetool};
use cassandra_ops::ops::{settings, toggles, Feature};
use cassandra_ops::{ExecutionResult, RunOptions};

fn config() -> ConnectionConfig {
    ConnectionConfig::new("10.0.0.5", 7199)
}

// =============================================================================
// STATUS / ENABLE / DISABLE
// =============================================================================

/// Enabling twice issues the enable subcommand once.
#[test]
fn test_enable_twice_enables_once() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![
        ExecutionResult::ok("not running\n"),
        ExecutionResult::ok(""),
        ExecutionResult::ok("running\n"),
    ]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

    let first = toggles::ensure_feature(&nt, Feature::Gossip, DesiredState::Enabled).unwrap();
    let second = toggles::ensure_feature(&nt, Feature::Gossip, DesiredState::Enabled).unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(exec.count_matching(" enablegossip"), 1);
    assert_eq!(exec.count_matching(" statusgossip"), 2);
}

/// Disabling a feature that is already off runs only the status command.
#[test]
fn test_disable_when_already_disabled() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok("not running\n")]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

    let outcome = toggles::ensure_feature(&nt, Feature::Binary, DesiredState::Disabled).unwrap();
    assert!(!outcome.changed);
    assert_eq!(exec.count(), 1);
}

/// An unrecognised status sentence is a parse failure, not a change.
#[test]
fn test_unknown_status_output_fails() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok("maybe\n")]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

    let err = toggles::ensure_feature(&nt, Feature::Thrift, DesiredState::Enabled).unwrap_err();
    assert_eq!(err.code(), "CASS_PARSE_FAILED");
    assert_eq!(exec.count(), 1);
}

// =============================================================================
// GET / SET
// =============================================================================

/// A get sentence that already shows the desired value skips the set.
#[test]
fn test_matching_sentence_skips_set() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
        "Current compaction throughput: 64 MB/s\n",
    )]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

    let outcome = settings::compaction_throughput(&nt, 64).unwrap();
    assert!(!outcome.changed);
    assert_eq!(exec.count_matching("setcompactionthroughput 64"), 0);
}

#[test]
fn test_different_sentence_sets_value() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
        "Current compaction throughput: 16 MB/s\n",
    )]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

    let outcome = settings::compaction_throughput(&nt, 64).unwrap();
    assert!(outcome.changed);
    assert_eq!(exec.count_matching(" setcompactionthroughput 64"), 1);
}

/// Check mode reads but never writes.
#[test]
fn test_check_mode_never_sets() {
    let cfg = config();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
        "Current stream throughput: 200 Mb/s\n",
    )]);
    let nt = Nodetool::new(&cfg, &exec, RunOptions::check());

    let outcome = settings::stream_throughput(&nt, 400).unwrap();
    assert!(outcome.changed);
    assert_eq!(exec.count(), 1);
}

// =============================================================================
// SCHEMA
// =============================================================================

#[test]
fn test_keyspace_second_run_unchanged() {
    let session = MemorySession::new();
    session.respond(
        "SELECT release_version",
        vec![row(&[("release_version", json!("4.1.3"))])],
    );
    let request = KeyspaceRequest::new("app");

    let first = ensure_keyspace(&session, &request, RunOptions::default()).unwrap();
    assert!(first.changed);

    session.respond(
        "SELECT keyspace_name, replication",
        vec![row(&[
            ("keyspace_name", json!("app")),
            (
                "replication",
                json!({"class": "org.apache.cassandra.locator.SimpleStrategy", "replication_factor": "1"}),
            ),
            ("durable_writes", json!(true)),
        ])],
    );
    let second = ensure_keyspace(&session, &request, RunOptions::default()).unwrap();
    assert!(!second.changed);
    assert_eq!(session.mutations().len(), 1);
}

#[test]
fn test_role_second_run_unchanged() {
    let session = MemorySession::new();
    let request = RoleRequest::new("reporting");

    let first = ensure_role(&session, &request, RunOptions::default()).unwrap();
    assert!(first.changed);

    session.respond(
        "SELECT role, can_login",
        vec![row(&[
            ("role", json!("reporting")),
            ("can_login", json!(true)),
            ("is_superuser", json!(false)),
            ("member_of", Value::Null),
        ])],
    );
    let second = ensure_role(&session, &request, RunOptions::default()).unwrap();
    assert!(!second.changed);
    assert_eq!(session.mutations().len(), 1);
}
