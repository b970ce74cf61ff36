//! Crate-wide error type
//!
//! Every operation is terminal on error: nothing here is retried except the
//! explicit polling loops in `nodetool::poll`.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Result type for cassandra-ops operations
pub type OpsResult<T> = Result<T, OpsError>;

/// Operation errors
#[derive(Debug, Clone, Error)]
pub enum OpsError {
    /// nodetool/cqlsh exited non-zero
    #[error("{message}")]
    ToolInvocation {
        message: String,
        command: String,
        rc: i32,
        stdout: String,
        stderr: String,
    },

    /// Tool output did not have the expected shape
    #[error("{0}")]
    Parse(String),

    /// Could not reach the cluster
    #[error("Error connecting to cluster: {0}")]
    Connection(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The cluster rejected a CQL statement
    #[error("{message} | {cql}")]
    Query { message: String, cql: String },

    /// Input rejected before any external call
    #[error("{0}")]
    Validation(String),

    /// A polling loop ran out of attempts
    #[error("{message}")]
    NotConverged { message: String, details: Value },

    /// Configuration file problem
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Process could not be spawned
    #[error("I/O error: {0}")]
    Io(String),
}

impl OpsError {
    /// Build a tool failure from an execution result
    pub fn tool(
        message: impl Into<String>,
        command: impl Into<String>,
        result: &crate::outcome::ExecutionResult,
    ) -> Self {
        Self::ToolInvocation {
            message: message.into(),
            command: command.into(),
            rc: result.rc,
            stdout: result.stdout.trim().to_string(),
            stderr: result.stderr.trim().to_string(),
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            OpsError::ToolInvocation { .. } => "CASS_TOOL_FAILED",
            OpsError::Parse(_) => "CASS_PARSE_FAILED",
            OpsError::Connection(_) => "CASS_CONNECTION_FAILED",
            OpsError::Authentication(_) => "CASS_AUTHENTICATION_FAILED",
            OpsError::Query { .. } => "CASS_QUERY_FAILED",
            OpsError::Validation(_) => "CASS_VALIDATION_FAILED",
            OpsError::NotConverged { .. } => "CASS_NOT_CONVERGED",
            OpsError::Config(_) => "CASS_CONFIG_ERROR",
            OpsError::Io(_) => "CASS_IO_ERROR",
        }
    }

    /// Whether the failure happened before anything was executed
    pub fn is_validation(&self) -> bool {
        matches!(self, OpsError::Validation(_))
    }

    /// Render the failure outcome returned to the caller.
    ///
    /// Tool output is only attached when `debug` is set.
    pub fn to_failure_json(&self, debug: bool) -> Value {
        let mut out = Map::new();
        out.insert("failed".into(), json!(true));
        out.insert("changed".into(), json!(false));
        out.insert("msg".into(), json!(self.to_string()));
        out.insert("code".into(), json!(self.code()));

        match self {
            OpsError::ToolInvocation {
                command,
                rc,
                stdout,
                stderr,
                ..
            } => {
                out.insert("rc".into(), json!(rc));
                if debug {
                    out.insert("cmd".into(), json!(command));
                    if !stdout.is_empty() {
                        out.insert("stdout".into(), json!(stdout));
                    }
                    if !stderr.is_empty() {
                        out.insert("stderr".into(), json!(stderr));
                    }
                }
            }
            OpsError::Query { cql, .. } if debug => {
                out.insert("cql".into(), json!(cql));
            }
            OpsError::NotConverged { details, .. } => {
                if let Value::Object(map) = details {
                    for (k, v) in map {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            _ => {}
        }

        Value::Object(out)
    }
}

impl From<std::io::Error> for OpsError {
    fn from(e: std::io::Error) -> Self {
        OpsError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(e: serde_json::Error) -> Self {
        OpsError::Parse(format!("JSON error: {}", e))
    }
}
