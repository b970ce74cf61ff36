//! CLI module for cassandra-ops
//!
//! One subcommand per operation. Output is a single JSON object on stdout;
//! structured logs go to stderr.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, GlobalArgs};
pub use commands::{run, run_cli, run_command, schema_request, Context, SchemaRequest};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_failure, write_outcome};
