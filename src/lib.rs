//! cassandra-ops - declarative, idempotent operations on Cassandra nodes
//!
//! Wraps `nodetool` and `cqlsh`: each operation reads current state,
//! issues a mutating command only when it differs from the desired state
//! and reports a changed/unchanged outcome.

pub mod cli;
pub mod config;
pub mod connection;
pub mod cql;
pub mod cqlsh;
pub mod errors;
pub mod executor;
pub mod nodetool;
pub mod observability;
pub mod ops;
pub mod outcome;

pub use errors::{OpsError, OpsResult};
pub use outcome::{ExecutionResult, ModuleOutcome, RunOptions};
