//! Declarative nodetool operations
//!
//! Each function takes a [`Nodetool`](crate::nodetool::Nodetool) handle,
//! reads the current state where nodetool exposes one and returns a
//! [`ModuleOutcome`](crate::outcome::ModuleOutcome).

pub mod cluster;
pub mod fullquerylog;
pub mod maintenance;
pub mod settings;
pub mod toggles;

pub use cluster::{cluster_status, schema_agreement};
pub use fullquerylog::{full_query_log, FqlState, FullQueryLogRequest, RollCycle};
pub use settings::{ConcurrencyType, Stage, TimeoutType};
pub use toggles::Feature;
