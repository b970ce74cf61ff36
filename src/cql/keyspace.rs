//! Keyspace management
//!
//! SimpleStrategy or NetworkTopologyStrategy. The replication settings,
//! strategy class and durable writes of an existing keyspace are altered
//! in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::session::{text, text_map, CqlRow};
use super::{apply, literal, message, CqlSession, Presence};
use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ModuleOutcome, RunOptions};

const SIMPLE: &str = "SimpleStrategy";
const NETWORK_TOPOLOGY: &str = "NetworkTopologyStrategy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceRequest {
    pub name: String,
    #[serde(default)]
    pub state: Presence,
    /// Used with SimpleStrategy; ignored when `data_centres` is set
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    #[serde(default = "default_durable_writes")]
    pub durable_writes: bool,
    /// Per-DC replication; selects NetworkTopologyStrategy
    #[serde(default, alias = "data_centers")]
    pub data_centres: Option<BTreeMap<String, u32>>,
}

fn default_replication_factor() -> u32 {
    1
}

fn default_durable_writes() -> bool {
    true
}

impl KeyspaceRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Presence::Present,
            replication_factor: default_replication_factor(),
            durable_writes: default_durable_writes(),
            data_centres: None,
        }
    }

    fn strategy(&self) -> &'static str {
        if self.data_centres.is_some() {
            NETWORK_TOPOLOGY
        } else {
            SIMPLE
        }
    }

    /// CREATE or ALTER statement for this request
    pub fn statement(&self, alter: bool) -> String {
        let verb = if alter { "ALTER" } else { "CREATE" };
        let replication = match &self.data_centres {
            Some(dcs) => {
                let factors: Vec<String> = dcs
                    .iter()
                    .map(|(dc, rf)| format!("{} : {}", literal(dc), rf))
                    .collect();
                format!(
                    "{{ 'class' : '{}', {} }}",
                    NETWORK_TOPOLOGY,
                    factors.join(", ")
                )
            }
            None => format!(
                "{{ 'class' : '{}', 'replication_factor' : {} }}",
                SIMPLE, self.replication_factor
            ),
        };
        format!(
            "{} KEYSPACE {} WITH REPLICATION = {} AND DURABLE_WRITES = {}",
            verb, self.name, replication, self.durable_writes
        )
    }
}

/// Replication settings read back from the schema tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyspaceConfig {
    /// Strategy class without its package
    pub class: String,
    /// `replication_factor` for SimpleStrategy, DC name to factor otherwise
    pub factors: BTreeMap<String, u32>,
    pub durable_writes: bool,
}

fn short_class(class: &str) -> String {
    class.rsplit('.').next().unwrap_or(class).to_string()
}

fn parse_factors(options: BTreeMap<String, String>) -> OpsResult<(String, BTreeMap<String, u32>)> {
    let mut class = None;
    let mut factors = BTreeMap::new();
    for (key, value) in options {
        if key == "class" {
            class = Some(short_class(&value));
            continue;
        }
        let rf = value
            .parse()
            .map_err(|_| OpsError::Parse(format!("invalid replication factor '{}' for {}", value, key)))?;
        factors.insert(key, rf);
    }
    let class = class.ok_or_else(|| OpsError::Parse("replication settings have no class".to_string()))?;
    Ok((class, factors))
}

fn durable_writes(row: &CqlRow) -> bool {
    row.get("durable_writes")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(true)
}

/// Major version from a release string such as `4.1.3`
fn major_version(release: &str) -> OpsResult<u32> {
    release
        .split('.')
        .next()
        .and_then(|m| m.trim().parse().ok())
        .ok_or_else(|| OpsError::Parse(format!("unable to parse release_version '{}'", release)))
}

/// Current settings of `name`, or `None` when it does not exist
pub fn current_config(session: &dyn CqlSession, name: &str) -> OpsResult<Option<KeyspaceConfig>> {
    let major = major_version(&session.release_version()?)?;

    if major >= 3 {
        let rows = session.query(&format!(
            "SELECT keyspace_name, replication, durable_writes FROM system_schema.keyspaces WHERE keyspace_name = {}",
            literal(name)
        ))?;
        let Some(row) = rows.into_iter().find(|r| text(r, "keyspace_name") == Some(name)) else {
            return Ok(None);
        };
        let (class, factors) = parse_factors(text_map(&row, "replication"))?;
        return Ok(Some(KeyspaceConfig {
            class,
            factors,
            durable_writes: durable_writes(&row),
        }));
    }

    let rows = session.query(&format!(
        "SELECT keyspace_name, strategy_class, strategy_options, durable_writes FROM system.schema_keyspaces WHERE keyspace_name = {}",
        literal(name)
    ))?;
    let Some(row) = rows.into_iter().find(|r| text(r, "keyspace_name") == Some(name)) else {
        return Ok(None);
    };
    let mut options: BTreeMap<String, String> =
        serde_json::from_str(text(&row, "strategy_options").unwrap_or("{}"))
            .map_err(|e| OpsError::Parse(format!("invalid strategy_options: {}", e)))?;
    options.insert(
        "class".to_string(),
        text(&row, "strategy_class").unwrap_or_default().to_string(),
    );
    let (class, factors) = parse_factors(options)?;
    Ok(Some(KeyspaceConfig {
        class,
        factors,
        durable_writes: durable_writes(&row),
    }))
}

/// Whether `current` must be altered to match `request`.
///
/// A different strategy class is a change like any other; the ALTER
/// carries the full replication map of the requested strategy.
pub fn is_changed(request: &KeyspaceRequest, current: &KeyspaceConfig) -> OpsResult<bool> {
    if current.class != SIMPLE && current.class != NETWORK_TOPOLOGY {
        return Err(OpsError::Validation(format!(
            "Unknown Replication strategy: {}",
            current.class
        )));
    }
    if current.class != request.strategy() || current.durable_writes != request.durable_writes {
        return Ok(true);
    }

    let wanted: BTreeMap<String, u32> = match &request.data_centres {
        Some(dcs) => dcs.clone(),
        None => BTreeMap::from([("replication_factor".to_string(), request.replication_factor)]),
    };
    Ok(wanted != current.factors)
}

/// Create, alter or drop a keyspace
pub fn ensure_keyspace(
    session: &dyn CqlSession,
    request: &KeyspaceRequest,
    options: RunOptions,
) -> OpsResult<ModuleOutcome> {
    let current = current_config(session, &request.name)?;
    let name = &request.name;

    let outcome = match (request.state, current) {
        (Presence::Absent, None) => {
            log_event_with_fields(Event::StateSatisfied, &[("keyspace", name.as_str())]);
            ModuleOutcome::unchanged(format!("keyspace {} does not exist", name))
        }
        (Presence::Absent, Some(_)) => {
            let cql = format!("DROP KEYSPACE {}", name);
            apply(session, options, &cql)?;
            ModuleOutcome::changed(message(options, format!("keyspace {} dropped", name)))
                .with("cql", cql)
        }
        (Presence::Present, None) => {
            let cql = request.statement(false);
            apply(session, options, &cql)?;
            ModuleOutcome::changed(message(options, format!("keyspace {} created", name)))
                .with("cql", cql)
        }
        (Presence::Present, Some(config)) => {
            if is_changed(request, &config)? {
                let cql = request.statement(true);
                apply(session, options, &cql)?;
                ModuleOutcome::changed(message(options, format!("keyspace {} altered", name)))
                    .with("cql", cql)
            } else {
                log_event_with_fields(Event::StateSatisfied, &[("keyspace", name.as_str())]);
                ModuleOutcome::unchanged(format!("keyspace {} is unchanged", name))
            }
        }
    };
    Ok(outcome.with("keyspace", name))
}
