//! Native-protocol session backed by the scylla driver
//!
//! The driver is async; the session owns a small tokio runtime and blocks
//! on it for every statement, so callers stay synchronous.

use std::time::Duration;

use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslVerifyMode};
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{
    ConnectionSetupRequestErrorKind, DbError, ExecutionError, NewSessionError, RequestAttemptError,
};
use scylla::value::{CqlValue, Row};
use serde_json::{Map, Value};
use tokio::runtime::{Builder, Runtime};

use super::session::{redact_cql, release_version_of, CqlRow, CqlSession, RELEASE_VERSION_CQL};
use crate::connection::{CqlConnectionConfig, TlsConfig, VerifyMode};
use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};

/// `host:port`, bracketing IPv6 literals
fn contact_point(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn verify_mode(mode: VerifyMode) -> SslVerifyMode {
    match mode {
        VerifyMode::None => SslVerifyMode::NONE,
        // a server always presents a certificate, so optional verifies too
        VerifyMode::Optional | VerifyMode::Required => SslVerifyMode::PEER,
    }
}

/// OpenSSL client context for `tls`
pub fn tls_context(tls: &TlsConfig) -> OpsResult<SslContext> {
    let tls_err = |e: openssl::error::ErrorStack| OpsError::Config(format!("invalid TLS settings: {}", e));

    let mut builder = SslContextBuilder::new(SslMethod::tls()).map_err(tls_err)?;
    if let Some(ca) = &tls.ca_bundle {
        builder.set_ca_file(ca).map_err(tls_err)?;
    } else if tls.verify != VerifyMode::None {
        builder.set_default_verify_paths().map_err(tls_err)?;
    }
    builder.set_verify(verify_mode(tls.verify));
    Ok(builder.build())
}

/// Whether any error in the chain is a rejected login
fn is_auth_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(DbError::AuthenticationError | DbError::Unauthorized) = e.downcast_ref::<DbError>() {
            return true;
        }
        if let Some(ConnectionSetupRequestErrorKind::DbError(DbError::AuthenticationError, _)) =
            e.downcast_ref::<ConnectionSetupRequestErrorKind>()
        {
            return true;
        }
        current = e.source();
    }
    false
}

fn connect_error(err: NewSessionError) -> OpsError {
    if is_auth_failure(&err) {
        OpsError::Authentication(err.to_string())
    } else {
        OpsError::Connection(err.to_string())
    }
}

/// Sort a failed statement into the error taxonomy
fn execution_error(cql: &str, err: ExecutionError) -> OpsError {
    match &err {
        ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            DbError::AuthenticationError | DbError::Unauthorized,
            msg,
        )) => OpsError::Authentication(msg.clone()),
        ExecutionError::LastAttemptError(RequestAttemptError::DbError(_, msg)) => OpsError::Query {
            message: msg.clone(),
            cql: redact_cql(cql),
        },
        ExecutionError::ConnectionPoolError(_)
        | ExecutionError::EmptyPlan
        | ExecutionError::RequestTimeout(_) => OpsError::Connection(err.to_string()),
        _ if is_auth_failure(&err) => OpsError::Authentication(err.to_string()),
        _ => OpsError::Query {
            message: err.to_string(),
            cql: redact_cql(cql),
        },
    }
}

/// Object keys must be strings
fn key_of(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// JSON form of a CQL value
pub fn cql_to_json(value: CqlValue) -> Value {
    match value {
        CqlValue::Ascii(s) | CqlValue::Text(s) => Value::String(s),
        CqlValue::Boolean(b) => Value::Bool(b),
        CqlValue::TinyInt(n) => Value::from(n),
        CqlValue::SmallInt(n) => Value::from(n),
        CqlValue::Int(n) => Value::from(n),
        CqlValue::BigInt(n) => Value::from(n),
        CqlValue::Float(f) => Value::from(f),
        CqlValue::Double(f) => Value::from(f),
        CqlValue::Uuid(u) => Value::String(u.to_string()),
        CqlValue::Inet(ip) => Value::String(ip.to_string()),
        CqlValue::List(items) | CqlValue::Set(items) => {
            Value::Array(items.into_iter().map(cql_to_json).collect())
        }
        CqlValue::Map(pairs) => Value::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (key_of(cql_to_json(k)), cql_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        CqlValue::Empty => Value::Null,
        other => Value::String(format!("{:?}", other)),
    }
}

/// A driver session plus the runtime it runs on.
///
/// Contact points are all handed to the driver, which fails over between
/// them on its own.
pub struct ScyllaSession {
    // dropped inside the runtime, see Drop
    session: Option<Session>,
    runtime: Runtime,
    release_version: String,
}

impl ScyllaSession {
    /// Open a session and read the server version
    pub fn connect(config: &CqlConnectionConfig) -> OpsResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| OpsError::Io(format!("failed to start the CQL runtime: {}", e)))?;

        let nodes: Vec<String> = config
            .resolve_hosts()
            .iter()
            .map(|h| contact_point(h, config.port))
            .collect();
        let profile = ExecutionProfile::builder()
            .request_timeout(Some(Duration::from_secs(config.request_timeout.into())))
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(&nodes)
            .connection_timeout(Duration::from_secs(config.connect_timeout.into()))
            .default_execution_profile_handle(profile.into_handle());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.user(username, password);
        }
        if let Some(tls) = &config.tls {
            builder = builder.tls_context(Some(tls_context(tls)?));
        }

        let session = runtime.block_on(builder.build()).map_err(connect_error)?;
        let nodes_field = nodes.join(",");
        log_event_with_fields(Event::CqlConnected, &[("hosts", nodes_field.as_str())]);

        let mut opened = Self {
            session: Some(session),
            runtime,
            release_version: String::new(),
        };
        opened.release_version = release_version_of(&opened.query(RELEASE_VERSION_CQL)?)?;
        Ok(opened)
    }

    fn run(&self, cql: &str) -> OpsResult<scylla::response::query_result::QueryResult> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| OpsError::Connection("session is closed".to_string()))?;

        match self.runtime.block_on(session.query_unpaged(cql, ())) {
            Ok(result) => {
                log_event_with_fields(Event::CqlExecuted, &[("cql", redact_cql(cql).as_str())]);
                Ok(result)
            }
            Err(e) => {
                let err = execution_error(cql, e);
                log_event_with_fields(Event::CqlFailed, &[("code", err.code()), ("cql", redact_cql(cql).as_str())]);
                Err(err)
            }
        }
    }
}

impl CqlSession for ScyllaSession {
    fn execute(&self, cql: &str) -> OpsResult<()> {
        self.run(cql).map(|_| ())
    }

    fn query(&self, cql: &str) -> OpsResult<Vec<CqlRow>> {
        let rows = self
            .run(cql)?
            .into_rows_result()
            .map_err(|e| OpsError::Parse(format!("{} returned no rows: {}", redact_cql(cql), e)))?;
        let columns: Vec<String> = rows.column_specs().iter().map(|c| c.name().to_string()).collect();

        let typed = rows
            .rows::<Row>()
            .map_err(|e| OpsError::Parse(format!("unreadable result for {}: {}", redact_cql(cql), e)))?;
        let mut out = Vec::new();
        for row in typed {
            let row = row.map_err(|e| OpsError::Parse(format!("unreadable row: {}", e)))?;
            out.push(
                columns
                    .iter()
                    .cloned()
                    .zip(row.columns.into_iter().map(|v| v.map(cql_to_json).unwrap_or(Value::Null)))
                    .collect(),
            );
        }
        Ok(out)
    }

    /// Read once at connect time
    fn release_version(&self) -> OpsResult<String> {
        Ok(self.release_version.clone())
    }
}

impl Drop for ScyllaSession {
    fn drop(&mut self) {
        // the driver's background tasks must be torn down on its runtime
        let _guard = self.runtime.enter();
        self.session.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_points() {
        assert_eq!(contact_point("db1", 9042), "db1:9042");
        assert_eq!(contact_point("10.0.0.1", 9142), "10.0.0.1:9142");
        assert_eq!(contact_point("::1", 9042), "[::1]:9042");
    }

    #[test]
    fn test_cql_values_to_json() {
        let replication = CqlValue::Map(vec![
            (
                CqlValue::Text("class".into()),
                CqlValue::Text("org.apache.cassandra.locator.NetworkTopologyStrategy".into()),
            ),
            (CqlValue::Text("dc1".into()), CqlValue::Text("3".into())),
        ]);
        assert_eq!(
            cql_to_json(replication),
            json!({"class": "org.apache.cassandra.locator.NetworkTopologyStrategy", "dc1": "3"})
        );
        assert_eq!(
            cql_to_json(CqlValue::Set(vec![CqlValue::Text("ops".into())])),
            json!(["ops"])
        );
        assert_eq!(cql_to_json(CqlValue::Boolean(true)), json!(true));
        assert_eq!(cql_to_json(CqlValue::Int(7)), json!(7));
        assert_eq!(cql_to_json(CqlValue::Empty), Value::Null);
    }

    #[test]
    fn test_statement_errors_are_classified() {
        let rejected = ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            DbError::SyntaxError,
            "line 1:0 no viable alternative".into(),
        ));
        let err = execution_error("CREAT ROLE x", rejected);
        assert_eq!(err.code(), "CASS_QUERY_FAILED");
        assert_eq!(err.to_string(), "line 1:0 no viable alternative | CREAT ROLE x");

        let denied = ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            DbError::Unauthorized,
            "User app has no CREATE permission".into(),
        ));
        assert_eq!(execution_error("CREATE ROLE x", denied).code(), "CASS_AUTHENTICATION_FAILED");

        let unreachable = execution_error("SELECT 1", ExecutionError::EmptyPlan);
        assert_eq!(unreachable.code(), "CASS_CONNECTION_FAILED");
    }

    #[test]
    fn test_failed_statement_hides_password() {
        let rejected = ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            DbError::Invalid,
            "bad option".into(),
        ));
        let err = execution_error("CREATE ROLE app WITH PASSWORD = 'pa$$word'", rejected);
        assert!(!err.to_string().contains("pa$$word"));
    }

    #[test]
    fn test_tls_context_modes() {
        for verify in [VerifyMode::None, VerifyMode::Optional, VerifyMode::Required] {
            let tls = TlsConfig { ca_bundle: None, verify };
            assert!(tls_context(&tls).is_ok());
        }
        let missing = TlsConfig {
            ca_bundle: Some("/nonexistent/ca.pem".into()),
            verify: VerifyMode::Required,
        };
        assert_eq!(tls_context(&missing).unwrap_err().code(), "CASS_CONFIG_ERROR");
    }

    #[test]
    fn test_unreachable_cluster_is_connection_error() {
        let config = CqlConnectionConfig {
            connect_timeout: 1,
            ..CqlConnectionConfig::new(vec!["127.0.0.1".into()], 1)
        };
        let err = ScyllaSession::connect(&config).err().unwrap();
        assert_eq!(err.code(), "CASS_CONNECTION_FAILED");
    }
}
