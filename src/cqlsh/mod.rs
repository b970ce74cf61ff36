//! cqlsh invocation and output handling

pub mod command;
pub mod transform;

pub use command::CqlshConfig;
pub use transform::{parse_table, transform_output, Row, Transform};

use serde_json::Value;

use crate::errors::{OpsError, OpsResult};
use crate::executor::Executor;
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ModuleOutcome, RunOptions};

/// Run an arbitrary cqlsh invocation and transform what it prints.
///
/// Statements are opaque, so a successful run always reports a change.
/// A transform failure is reported in the message with a null
/// `transformed_output`, not as a failure.
pub fn run_cqlsh(
    executor: &dyn Executor,
    config: &CqlshConfig,
    transform: Transform,
    split_char: &str,
    options: RunOptions,
) -> OpsResult<ModuleOutcome> {
    let command = config.build();
    if options.debug {
        log_event_with_fields(Event::CommandRendered, &[("cmd", command.redacted().as_str())]);
    }
    if options.check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", command.redacted().as_str())]);
        return Ok(ModuleOutcome::changed("check mode"));
    }

    let result = executor.run(&command)?;
    if !result.success() {
        return Err(OpsError::tool("module execution failed", command.redacted(), &result));
    }

    let mut outcome = match transform_output(&result.stdout, transform, split_char) {
        Ok(value) => ModuleOutcome::changed(format!("transform type was {}", transform.as_str()))
            .with("transformed_output", value),
        Err(e) => ModuleOutcome::changed(e.to_string()).with("transformed_output", Value::Null),
    };
    if let Some(file) = &config.file {
        outcome = outcome.with("file", file);
    }
    if options.debug {
        outcome = outcome.with("cmd", command.redacted());
    }
    Ok(outcome.with_debug(options.debug, &result))
}
