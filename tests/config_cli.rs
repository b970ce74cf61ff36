//! Configuration file and command-line wiring

use std::io::Write;

use clap::Parser;
use serde_json::json;
use tempfile::NamedTempFile;

use cassandra_ops::cli::{run_command, schema_request, Cli, Context};
use cassandra_ops::cql::session::row;
use cassandra_ops::cql::MemorySession;
use cassandra_ops::executor::MockExecutor;
use cassandra_ops::nodetool::poll::RecordingSleeper;
use cassandra_ops::ExecutionResult;

fn config_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["cassandra-ops"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_config_file_connection_and_flag_override() {
    let file = config_file(
        r#"{"nodetool": {"host": "db1", "port": 7299, "username": "ops", "password_file": "/etc/jmx.pw", "extra_flags": ""}}"#,
    );
    let path = file.path().to_str().unwrap();
    let exec = MockExecutor::new();

    let parsed = cli(&["truncatehints", "--config", path, "--host", "db2"]);
    let ctx = Context::load(&parsed.global).unwrap();
    run_command(&ctx, &parsed.command, &exec, &RecordingSleeper::new()).unwrap();

    assert_eq!(
        exec.rendered(),
        vec!["nodetool --host db2 --port 7299 --username ops --password-file /etc/jmx.pw truncatehints".to_string()]
    );
}

#[test]
fn test_config_sentinel_override() {
    let file = config_file(
        r#"{"nodetool": {"host": "db1"}, "sentinels": {"statusbackup": {"active": ["enabled"], "inactive": ["disabled"]}}}"#,
    );
    let path = file.path().to_str().unwrap();
    let exec = MockExecutor::with_results(vec![ExecutionResult::ok("enabled\n")]);

    let parsed = cli(&["backup", "--config", path]);
    let ctx = Context::load(&parsed.global).unwrap();
    let outcome = run_command(&ctx, &parsed.command, &exec, &RecordingSleeper::new()).unwrap();

    assert!(!outcome.changed);
    assert_eq!(exec.count(), 1);
}

#[test]
fn test_config_poll_defaults() {
    let file = config_file(r#"{"nodetool": {"host": "db1"}, "poll": {"poll": 2, "interval": 7}}"#);
    let path = file.path().to_str().unwrap();
    let exec = MockExecutor::new();
    exec.respond_to(" describecluster", ExecutionResult::failed(2, "JMX unreachable"));
    let sleeper = RecordingSleeper::new();

    let parsed = cli(&["schema", "--config", path]);
    let ctx = Context::load(&parsed.global).unwrap();
    let err = run_command(&ctx, &parsed.command, &exec, &sleeper).unwrap_err();

    assert_eq!(err.code(), "CASS_TOOL_FAILED");
    assert_eq!(exec.count(), 2);
    assert_eq!(sleeper.sleeps(), vec![std::time::Duration::from_secs(7)]);
}

#[test]
fn test_malformed_config_is_config_error() {
    let file = config_file("{ not json");
    let parsed = cli(&["drain", "--config", file.path().to_str().unwrap()]);

    let err = Context::load(&parsed.global).unwrap_err();
    assert_eq!(err.code(), "CASS_CONFIG_ERROR");
    assert_eq!(err.to_failure_json(false)["failed"], true);
}

#[test]
fn test_keyspace_command_against_session() {
    let session = MemorySession::new();
    session.respond(
        "SELECT release_version",
        vec![row(&[("release_version", json!("4.1.3"))])],
    );

    let parsed = cli(&["keyspace", "app", "--login-host", "db1", "--data-centre", "dc1=3"]);
    let ctx = Context::load(&parsed.global).unwrap();
    let outcome = schema_request(&parsed.command)
        .unwrap()
        .run(&session, ctx.options)
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(
        outcome.get("cql").unwrap(),
        "CREATE KEYSPACE app WITH REPLICATION = { 'class' : 'NetworkTopologyStrategy', 'dc1' : 3 } AND DURABLE_WRITES = true"
    );
    assert_eq!(session.executed().len(), 3);
}

#[test]
fn test_invalid_schema_command_needs_no_connection() {
    let parsed = cli(&["keyspace", "app", "--data-centre", "dc1=three"]);
    assert!(schema_request(&parsed.command).unwrap_err().is_validation());
    assert!(schema_request(&cli(&["drain"]).command).is_err());
}
