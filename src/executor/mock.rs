//! Scripted executor for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::OpsResult;
use crate::outcome::ExecutionResult;

use super::{Command, Executor};

/// Replays scripted results and records every command it is given.
///
/// Lookup order per call: the first rule whose pattern the rendered command
/// ends with, then the FIFO queue, then the default result (`rc 0`, empty
/// output).
#[derive(Debug)]
pub struct MockExecutor {
    rules: Mutex<Vec<(String, ExecutionResult)>>,
    queue: Mutex<VecDeque<ExecutionResult>>,
    executed: Mutex<Vec<Command>>,
    default: ExecutionResult,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
            default: ExecutionResult::ok(""),
        }
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that replays `results` in order
    pub fn with_results(results: Vec<ExecutionResult>) -> Self {
        let exec = Self::new();
        for r in results {
            exec.push(r);
        }
        exec
    }

    /// Queue the next result
    pub fn push(&self, result: ExecutionResult) {
        self.queue.lock().unwrap().push_back(result);
    }

    /// Always answer commands ending with `body` with `result`
    pub fn respond_to(&self, body: impl Into<String>, result: ExecutionResult) {
        self.rules.lock().unwrap().push((body.into(), result));
    }

    /// Every command run so far
    pub fn commands(&self) -> Vec<Command> {
        self.executed.lock().unwrap().clone()
    }

    /// Rendered command lines run so far
    pub fn rendered(&self) -> Vec<String> {
        self.commands().iter().map(Command::render).collect()
    }

    pub fn count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    /// Number of commands whose rendered line ends with `body`
    pub fn count_matching(&self, body: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ends_with(body))
            .count()
    }
}

impl Executor for MockExecutor {
    fn run(&self, command: &Command) -> OpsResult<ExecutionResult> {
        self.executed.lock().unwrap().push(command.clone());

        let rendered = command.render();
        if let Some((_, result)) = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(body, _)| rendered.ends_with(body.as_str()))
        {
            return Ok(result.clone());
        }

        Ok(self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone()))
    }
}
