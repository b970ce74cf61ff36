//! Executor backed by real child processes

use std::process::{Command as StdCommand, Stdio};

use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::ExecutionResult;

use super::{Command, Executor};

/// Spawns the first token as the program and passes every other token as
/// one argument, blocking until the process exits
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ProcessExecutor {
    fn run(&self, command: &Command) -> OpsResult<ExecutionResult> {
        let (program, args) = command
            .tokens()
            .split_first()
            .ok_or_else(|| OpsError::Io("refusing to run an empty command".to_string()))?;

        let output = StdCommand::new(program)
            .args(args)
            .envs(command.env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| OpsError::Io(format!("failed to spawn '{}': {}", command.redacted(), e)))?;

        // Killed by a signal
        let rc = output.status.code().unwrap_or(-1);
        let result = ExecutionResult::new(
            rc,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        );

        let rc_str = rc.to_string();
        let event = if result.success() {
            Event::CommandExecuted
        } else {
            Event::CommandFailed
        };
        log_event_with_fields(event, &[("cmd", command.redacted().as_str()), ("rc", rc_str.as_str())]);

        Ok(result)
    }
}
