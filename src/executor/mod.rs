//! External process execution
//!
//! Every nodetool and cqlsh invocation goes through the `Executor` trait so
//! operations can be exercised without a Cassandra node.

mod command;
mod mock;
mod process;

pub use command::{quote_word, split_words, Command};
pub use mock::MockExecutor;
pub use process::ProcessExecutor;

use crate::errors::OpsResult;
use crate::outcome::ExecutionResult;

/// Runs a rendered command to completion
pub trait Executor: Send + Sync {
    /// Run `command`, blocking until it exits.
    ///
    /// A non-zero exit is still `Ok`; only a failure to launch is an error.
    fn run(&self, command: &Command) -> OpsResult<ExecutionResult>;
}
