//! nodetool command layer
//!
//! `Nodetool` binds one connection, one executor and the run options for
//! the lifetime of an operation. The command shapes in `variants` decide
//! what to run; `parsers` turn the text nodetool prints into values.

pub mod command;
pub mod parsers;
pub mod poll;
pub mod sentinels;
pub mod variants;

pub use command::{with_jobs_and_targets, with_targets, CommandBuilder};
pub use sentinels::{Observed, SentinelTable, Sentinels};
pub use variants::{CommandVariant, DesiredState, Matcher};

use crate::connection::ConnectionConfig;
use crate::errors::{OpsError, OpsResult};
use crate::executor::{Command, Executor};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ExecutionResult, RunOptions};

/// Handle for running nodetool subcommands against one node
pub struct Nodetool<'a> {
    config: ConnectionConfig,
    executor: &'a dyn Executor,
    options: RunOptions,
    sentinels: SentinelTable,
}

impl<'a> Nodetool<'a> {
    /// Pins the resolved host so every subcommand targets the same node
    pub fn new(config: &ConnectionConfig, executor: &'a dyn Executor, options: RunOptions) -> Self {
        Self {
            config: config.normalized(),
            executor,
            options,
            sentinels: SentinelTable::default(),
        }
    }

    pub fn with_sentinels(mut self, sentinels: SentinelTable) -> Self {
        self.sentinels = sentinels;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn sentinels(&self) -> &SentinelTable {
        &self.sentinels
    }

    /// Render the full command line for `subcommand`
    pub fn build(&self, subcommand: &str) -> Command {
        CommandBuilder::new(&self.config).build(subcommand)
    }

    /// Run `subcommand`; a non-zero exit is returned, not raised
    pub fn exec(&self, subcommand: &str) -> OpsResult<ExecutionResult> {
        let command = self.build(subcommand);
        if self.options.debug {
            log_event_with_fields(Event::CommandRendered, &[("cmd", command.redacted().as_str())]);
        }
        self.executor.run(&command)
    }

    /// Tool failure for `subcommand`, carrying the redacted command line
    pub fn failure(
        &self,
        message: impl Into<String>,
        subcommand: &str,
        result: &ExecutionResult,
    ) -> OpsError {
        OpsError::tool(message, self.build(subcommand).redacted(), result)
    }
}
