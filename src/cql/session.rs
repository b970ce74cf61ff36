//! CQL sessions
//!
//! The schema operations talk to the cluster through `CqlSession`.
//! [`ScyllaSession`](super::driver::ScyllaSession) is the native-protocol
//! driver; `MemorySession` scripts results for tests.
//!
//! Rows are typed: each column holds the JSON form of its CQL value, so
//! booleans stay booleans and maps, sets and lists keep their structure.

use std::collections::BTreeMap;
use std::sync::Mutex;

use regex::Regex;
use serde_json::Value;

use crate::errors::{OpsError, OpsResult};

/// One result row, column name to value
pub type CqlRow = BTreeMap<String, Value>;

/// A connection able to run CQL statements
pub trait CqlSession {
    /// Run a statement whose result is not needed
    fn execute(&self, cql: &str) -> OpsResult<()>;

    /// Run a statement and return its rows
    fn query(&self, cql: &str) -> OpsResult<Vec<CqlRow>>;

    /// Server version as reported by `system.local`
    fn release_version(&self) -> OpsResult<String> {
        release_version_of(&self.query(RELEASE_VERSION_CQL)?)
    }
}

pub(crate) const RELEASE_VERSION_CQL: &str = "SELECT release_version FROM system.local WHERE key='local'";

pub(crate) fn release_version_of(rows: &[CqlRow]) -> OpsResult<String> {
    rows.first()
        .and_then(|r| text(r, "release_version"))
        .map(String::from)
        .ok_or_else(|| OpsError::Parse("unable to read release_version from system.local".to_string()))
}

/// Text column, `None` when absent or null
pub fn text<'r>(row: &'r CqlRow, column: &str) -> Option<&'r str> {
    row.get(column).and_then(Value::as_str)
}

/// Boolean column; absent or null reads as false
pub fn flag(row: &CqlRow, column: &str) -> bool {
    row.get(column).and_then(Value::as_bool).unwrap_or(false)
}

/// Set or list of text; absent or null reads as empty
pub fn text_list(row: &CqlRow, column: &str) -> Vec<String> {
    match row.get(column) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Map of text to text; non-text values keep their JSON rendering
pub fn text_map(row: &CqlRow, column: &str) -> BTreeMap<String, String> {
    match row.get(column) {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Mask the value of `PASSWORD = '...'` in a statement
pub fn redact_cql(cql: &str) -> String {
    match Regex::new(r"(?i)(PASSWORD\s*=\s*)'(?:[^']|'')*'") {
        Ok(re) => re.replace_all(cql, "${1}'********'").into_owned(),
        Err(_) => cql.to_string(),
    }
}

/// Scripted session for tests.
///
/// Queries are answered by the first response whose prefix the statement
/// starts with; unmatched queries return no rows. Every statement is
/// recorded in order.
#[derive(Debug, Default)]
pub struct MemorySession {
    responses: Mutex<Vec<(String, Vec<CqlRow>)>>,
    failures: Mutex<Vec<(String, OpsError)>>,
    executed: Mutex<Vec<String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements starting with `prefix` with `rows`
    pub fn respond(&self, prefix: impl Into<String>, rows: Vec<CqlRow>) {
        self.responses.lock().unwrap().push((prefix.into(), rows));
    }

    /// Fail statements starting with `prefix`
    pub fn fail_on(&self, prefix: impl Into<String>, error: OpsError) {
        self.failures.lock().unwrap().push((prefix.into(), error));
    }

    /// Every statement run so far
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Statements other than reads
    pub fn mutations(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|s| !s.starts_with("SELECT") && !s.starts_with("LIST"))
            .collect()
    }

    fn record(&self, cql: &str) -> OpsResult<()> {
        self.executed.lock().unwrap().push(cql.to_string());
        match self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| cql.starts_with(prefix.as_str()))
        {
            Some((_, err)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl CqlSession for MemorySession {
    fn execute(&self, cql: &str) -> OpsResult<()> {
        self.record(cql)
    }

    fn query(&self, cql: &str) -> OpsResult<Vec<CqlRow>> {
        self.record(cql)?;
        Ok(self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| cql.starts_with(prefix.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

/// Build a row from `(column, value)` pairs
pub fn row(cells: &[(&str, Value)]) -> CqlRow {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_release_version() {
        let session = MemorySession::new();
        session.respond("SELECT release_version", vec![row(&[("release_version", json!("4.1.3"))])]);
        assert_eq!(session.release_version().unwrap(), "4.1.3");

        let empty = MemorySession::new();
        assert_eq!(empty.release_version().unwrap_err().code(), "CASS_PARSE_FAILED");
    }

    #[test]
    fn test_column_readers() {
        let r = row(&[
            ("role", json!("app")),
            ("can_login", json!(true)),
            ("member_of", json!(["ops", "readers"])),
            ("replication", json!({"class": "SimpleStrategy", "replication_factor": "3"})),
            ("salted_hash", Value::Null),
        ]);
        assert_eq!(text(&r, "role"), Some("app"));
        assert_eq!(text(&r, "salted_hash"), None);
        assert!(flag(&r, "can_login"));
        assert!(!flag(&r, "is_superuser"));
        assert_eq!(text_list(&r, "member_of"), vec!["ops".to_string(), "readers".to_string()]);
        assert!(text_list(&r, "role").is_empty());
        assert_eq!(text_map(&r, "replication")["replication_factor"], "3");
    }

    #[test]
    fn test_redact_cql() {
        assert_eq!(
            redact_cql("CREATE ROLE app WITH PASSWORD = 'hunter2' AND LOGIN = true"),
            "CREATE ROLE app WITH PASSWORD = '********' AND LOGIN = true"
        );
        assert_eq!(
            redact_cql("ALTER ROLE app WITH PASSWORD = 'it''s $x' AND LOGIN = true"),
            "ALTER ROLE app WITH PASSWORD = '********' AND LOGIN = true"
        );
    }

    #[test]
    fn test_memory_session() {
        let session = MemorySession::new();
        session.respond("SELECT role", vec![row(&[("role", json!("app"))])]);
        session.fail_on("DROP", OpsError::Validation("nope".into()));

        assert_eq!(session.query("SELECT role FROM x").unwrap().len(), 1);
        assert!(session.query("SELECT other").unwrap().is_empty());
        assert!(session.execute("DROP ROLE app").is_err());
        assert_eq!(session.mutations(), vec!["DROP ROLE app".to_string()]);
    }
}
