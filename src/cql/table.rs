//! Table and user-defined type management
//!
//! Existing objects are never altered. A table that exists satisfies
//! `present` whatever its columns.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{apply, literal, message, CqlSession, Presence};
use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ModuleOutcome, RunOptions};

/// A `name value` pair such as a column and its type, or a clustering
/// column and its order.
///
/// Deserializes from a single-entry map (`{"id": "uuid"}`) and parses
/// from `name:value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for NamedValue {
    type Error = String;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut entries = map.into_iter();
        match (entries.next(), entries.next()) {
            (Some((name, value)), None) => Ok(Self { name, value }),
            _ => Err("expected a single `name: value` entry".to_string()),
        }
    }
}

impl From<NamedValue> for BTreeMap<String, String> {
    fn from(nv: NamedValue) -> Self {
        BTreeMap::from([(nv.name, nv.value)])
    }
}

impl FromStr for NamedValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
                Ok(Self::new(name.trim(), value.trim()))
            }
            _ => Err(format!("expected name:value, got {:?}", s)),
        }
    }
}

impl fmt::Display for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRequest {
    pub name: String,
    pub keyspace: String,
    #[serde(default)]
    pub state: Presence,
    #[serde(default)]
    pub columns: Vec<NamedValue>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Leading primary key columns forming a composite partition key
    #[serde(default)]
    pub partition_key: Vec<String>,
    #[serde(default)]
    pub clustering: Vec<NamedValue>,
    /// Rendered verbatim as `name = value`
    #[serde(default)]
    pub table_options: BTreeMap<String, Value>,
    /// Manage a user-defined type instead of a table
    #[serde(default)]
    pub is_type: bool,
}

impl TableRequest {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyspace: keyspace.into(),
            state: Presence::Present,
            columns: Vec::new(),
            primary_key: Vec::new(),
            partition_key: Vec::new(),
            clustering: Vec::new(),
            table_options: BTreeMap::new(),
            is_type: false,
        }
    }

    fn kind(&self) -> &'static str {
        if self.is_type {
            "type"
        } else {
            "table"
        }
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }

    /// Presence requirements checked before any statement runs
    pub fn validate(&self) -> OpsResult<()> {
        if self.state == Presence::Absent {
            return Ok(());
        }
        let mut missing = Vec::new();
        if self.columns.is_empty() {
            missing.push("columns");
        }
        if self.primary_key.is_empty() && !self.is_type {
            missing.push("primary_key");
        }
        if !missing.is_empty() {
            return Err(OpsError::Validation(format!(
                "state is present but all of the following are missing: {}",
                missing.join(", ")
            )));
        }
        if !self.is_type {
            primary_key_clause(&self.primary_key, &self.partition_key)?;
        }
        Ok(())
    }

    /// CREATE TABLE or CREATE TYPE statement
    pub fn statement(&self) -> OpsResult<String> {
        let columns: Vec<String> = self.columns.iter().map(NamedValue::to_string).collect();
        let mut cql = format!(
            "CREATE {} {} ( {}",
            self.kind().to_uppercase(),
            self.qualified(),
            columns.join(", ")
        );
        if self.is_type {
            cql.push_str(" )");
            return Ok(cql);
        }
        cql.push_str(", ");
        cql.push_str(&primary_key_clause(&self.primary_key, &self.partition_key)?);

        let mut with = Vec::new();
        if !self.clustering.is_empty() {
            let order: Vec<String> = self.clustering.iter().map(NamedValue::to_string).collect();
            with.push(format!("CLUSTERING ORDER BY ({})", order.join(", ")));
        }
        for (option, value) in &self.table_options {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            with.push(format!("{} = {}", option, rendered));
        }
        if !with.is_empty() {
            cql.push_str(" WITH ");
            cql.push_str(&with.join(" AND "));
        }
        Ok(cql)
    }

    /// DROP TABLE or DROP TYPE statement
    pub fn drop_statement(&self) -> String {
        format!("DROP {} {}", self.kind().to_uppercase(), self.qualified())
    }
}

/// `PRIMARY KEY (...))` closing the column list.
///
/// A non-empty partition key must be a prefix of the primary key and is
/// wrapped in its own parentheses.
pub fn primary_key_clause(primary_key: &[String], partition_key: &[String]) -> OpsResult<String> {
    if partition_key.len() > primary_key.len()
        || partition_key.iter().zip(primary_key).any(|(p, k)| p != k)
    {
        return Err(OpsError::Validation(
            "partition_key list elements do not match primary_key elements".to_string(),
        ));
    }
    if partition_key.is_empty() {
        return Ok(format!("PRIMARY KEY ({}))", primary_key.join(", ")));
    }
    let mut parts = vec![format!("({})", partition_key.join(", "))];
    parts.extend(primary_key[partition_key.len()..].iter().cloned());
    Ok(format!("PRIMARY KEY ({}))", parts.join(", ")))
}

fn exists(session: &dyn CqlSession, request: &TableRequest) -> OpsResult<bool> {
    let (table, column) = if request.is_type {
        ("system_schema.types", "type_name")
    } else {
        ("system_schema.tables", "table_name")
    };
    let rows = session.query(&format!(
        "SELECT {column} FROM {table} WHERE keyspace_name = {} AND {column} = {}",
        literal(&request.keyspace),
        literal(&request.name),
    ))?;
    Ok(!rows.is_empty())
}

/// Create or drop a table or user-defined type
pub fn ensure_table(
    session: &dyn CqlSession,
    request: &TableRequest,
    options: RunOptions,
) -> OpsResult<ModuleOutcome> {
    request.validate()?;
    let kind = request.kind();
    let name = request.qualified();
    let present = exists(session, request)?;

    match (request.state, present) {
        (Presence::Present, true) => {
            log_event_with_fields(Event::StateSatisfied, &[(kind, name.as_str())]);
            Ok(ModuleOutcome::unchanged(format!("{} {} already exists", kind, name)).with(kind, &name))
        }
        (Presence::Absent, false) => {
            Ok(ModuleOutcome::unchanged(format!("{} {} does not exist", kind, name)).with(kind, &name))
        }
        (Presence::Present, false) => {
            let cql = request.statement()?;
            apply(session, options, &cql)?;
            Ok(ModuleOutcome::changed(message(options, format!("{} {} created", kind, name)))
                .with(kind, &name)
                .with("cql", cql))
        }
        (Presence::Absent, true) => {
            let cql = request.drop_statement();
            apply(session, options, &cql)?;
            Ok(ModuleOutcome::changed(message(options, format!("{} {} dropped", kind, name)))
                .with(kind, &name)
                .with("cql", cql))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::session::{row, MemorySession};
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn events_table() -> TableRequest {
        TableRequest {
            columns: vec![
                NamedValue::new("tenant", "text"),
                NamedValue::new("day", "date"),
                NamedValue::new("ts", "timestamp"),
                NamedValue::new("payload", "blob"),
            ],
            primary_key: keys(&["tenant", "day", "ts"]),
            partition_key: keys(&["tenant", "day"]),
            clustering: vec![NamedValue::new("ts", "DESC")],
            ..TableRequest::new("app", "events")
        }
    }

    #[test]
    fn test_primary_key_clause() {
        let pk = keys(&["a", "b", "c"]);
        assert_eq!(primary_key_clause(&pk, &[]).unwrap(), "PRIMARY KEY (a, b, c))");
        assert_eq!(primary_key_clause(&pk, &keys(&["a"])).unwrap(), "PRIMARY KEY ((a), b, c))");
        assert_eq!(primary_key_clause(&pk, &keys(&["a", "b", "c"])).unwrap(), "PRIMARY KEY ((a, b, c)))");
        assert!(primary_key_clause(&pk, &keys(&["b"])).unwrap_err().is_validation());
    }

    #[test]
    fn test_create_statement() {
        let mut req = events_table();
        req.table_options.insert("gc_grace_seconds".into(), json!(3600));
        req.table_options.insert("comment".into(), json!("'events by day'"));
        assert_eq!(
            req.statement().unwrap(),
            "CREATE TABLE app.events ( tenant text, day date, ts timestamp, payload blob, \
             PRIMARY KEY ((tenant, day), ts)) WITH CLUSTERING ORDER BY (ts DESC) \
             AND comment = 'events by day' AND gc_grace_seconds = 3600"
        );
    }

    #[test]
    fn test_type_statement() {
        let req = TableRequest {
            columns: vec![NamedValue::new("street", "text"), NamedValue::new("zip", "int")],
            is_type: true,
            ..TableRequest::new("app", "address")
        };
        req.validate().unwrap();
        assert_eq!(req.statement().unwrap(), "CREATE TYPE app.address ( street text, zip int )");
        assert_eq!(req.drop_statement(), "DROP TYPE app.address");
    }

    #[test]
    fn test_missing_columns() {
        let err = TableRequest::new("app", "t").validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "state is present but all of the following are missing: columns, primary_key"
        );
    }

    #[test]
    fn test_named_value_forms() {
        let nv: NamedValue = "id: uuid".parse().unwrap();
        assert_eq!(nv, NamedValue::new("id", "uuid"));
        assert!("id".parse::<NamedValue>().is_err());

        let parsed: Vec<NamedValue> = serde_json::from_value(json!([{"id": "uuid"}])).unwrap();
        assert_eq!(parsed, vec![NamedValue::new("id", "uuid")]);
        assert!(serde_json::from_value::<NamedValue>(json!({"a": "int", "b": "int"})).is_err());
    }

    #[test]
    fn test_create_when_missing() {
        let session = MemorySession::new();
        let outcome = ensure_table(&session, &events_table(), RunOptions::default()).unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "table app.events created");
        assert_eq!(
            session.executed()[0],
            "SELECT table_name FROM system_schema.tables WHERE keyspace_name = 'app' AND table_name = 'events'"
        );
        assert_eq!(session.mutations().len(), 1);
    }

    #[test]
    fn test_existing_table_unchanged() {
        let session = MemorySession::new();
        session.respond("SELECT table_name", vec![row(&[("table_name", json!("events"))])]);

        let outcome = ensure_table(&session, &events_table(), RunOptions::default()).unwrap();
        assert!(!outcome.changed);
        assert!(session.mutations().is_empty());
    }

    #[test]
    fn test_drop_type() {
        let session = MemorySession::new();
        session.respond("SELECT type_name", vec![row(&[("type_name", json!("address"))])]);
        let req = TableRequest {
            state: Presence::Absent,
            is_type: true,
            ..TableRequest::new("app", "address")
        };

        let outcome = ensure_table(&session, &req, RunOptions::default()).unwrap();
        assert_eq!(outcome.msg, "type app.address dropped");
        assert_eq!(session.mutations(), vec!["DROP TYPE app.address".to_string()]);
    }

    #[test]
    fn test_check_mode_create() {
        let session = MemorySession::new();
        let outcome = ensure_table(&session, &events_table(), RunOptions::check()).unwrap();
        assert!(outcome.changed);
        assert!(outcome.msg.ends_with("(check mode)"));
        assert!(session.mutations().is_empty());
    }
}
