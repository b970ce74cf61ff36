//! Schema operations over CQL
//!
//! Keyspaces, roles and tables. Each operation reads the system tables
//! first and only issues DDL when the cluster differs from the request.
//! Statements run one at a time and are never rolled back.

pub mod driver;
pub mod keyspace;
pub mod role;
pub mod session;
pub mod table;

pub use driver::ScyllaSession;
pub use keyspace::{ensure_keyspace, KeyspaceRequest};
pub use role::{ensure_role, RoleRequest};
pub use session::{CqlRow, CqlSession, MemorySession};
pub use table::{ensure_table, TableRequest};

use serde::{Deserialize, Serialize};

use crate::errors::OpsResult;
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::RunOptions;

/// Whether a schema object should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

/// Run a mutating statement unless in check mode
fn apply(session: &dyn CqlSession, options: RunOptions, cql: &str) -> OpsResult<()> {
    if options.check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cql", session::redact_cql(cql).as_str())]);
        return Ok(());
    }
    session.execute(cql)?;
    log_event_with_fields(Event::StateChanged, &[("cql", session::redact_cql(cql).as_str())]);
    Ok(())
}

fn message(options: RunOptions, msg: String) -> String {
    if options.check_mode {
        format!("{} (check mode)", msg)
    } else {
        msg
    }
}

/// Quote a string literal for CQL
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
