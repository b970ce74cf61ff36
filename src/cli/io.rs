//! JSON output for the CLI
//!
//! - Output: a single JSON object on stdout
//! - Logs go to stderr, never stdout

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;
use crate::errors::OpsError;
use crate::outcome::ModuleOutcome;

/// Write an operation outcome to stdout
pub fn write_outcome(outcome: &ModuleOutcome) -> CliResult<()> {
    write_value(&outcome.to_json())
}

/// Write an operation failure to stdout
pub fn write_failure(err: &OpsError, debug: bool) -> CliResult<()> {
    write_value(&err.to_failure_json(debug))
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
