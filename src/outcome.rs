//! Execution results and operation outcomes
//!
//! `ExecutionResult` is produced once per external process; `ModuleOutcome`
//! is the contract handed back to the orchestrator.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Captured output of one external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn new(rc: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            rc,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Successful invocation with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    /// Failed invocation with the given return code and stderr
    pub fn failed(rc: i32, stderr: impl Into<String>) -> Self {
        Self::new(rc, "", stderr)
    }

    pub fn success(&self) -> bool {
        self.rc == 0
    }

    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }

    pub fn trimmed_stderr(&self) -> &str {
        self.stderr.trim()
    }
}

/// Per-invocation switches shared by every operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Run read-only commands only and report what would change
    pub check_mode: bool,
    /// Attach tool output to outcomes and log rendered commands
    pub debug: bool,
}

impl RunOptions {
    pub fn check() -> Self {
        Self {
            check_mode: true,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Tool output attached to an outcome when debugging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl From<&ExecutionResult> for DebugInfo {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            rc: Some(result.rc),
            stdout: result.trimmed_stdout().to_string(),
            stderr: result.trimmed_stderr().to_string(),
        }
    }
}

/// Externally visible result of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub changed: bool,
    pub msg: String,
    pub payload: Map<String, Value>,
    pub debug: Option<DebugInfo>,
}

impl ModuleOutcome {
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: msg.into(),
            payload: Map::new(),
            debug: None,
        }
    }

    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            payload: Map::new(),
            debug: None,
        }
    }

    /// Build from a changed flag
    pub fn new(changed: bool, msg: impl Into<String>) -> Self {
        if changed {
            Self::changed(msg)
        } else {
            Self::unchanged(msg)
        }
    }

    /// Attach a payload entry
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Attach tool output when `debug` is set
    pub fn with_debug(mut self, debug: bool, result: &ExecutionResult) -> Self {
        if debug {
            self.debug = Some(DebugInfo::from(result));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Render the JSON object printed by the CLI
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("changed".into(), json!(self.changed));
        out.insert("msg".into(), json!(self.msg));
        for (k, v) in &self.payload {
            out.insert(k.clone(), v.clone());
        }
        if let Some(debug) = &self.debug {
            if let Ok(Value::Object(map)) = serde_json::to_value(debug) {
                out.extend(map);
            }
        }
        Value::Object(out)
    }
}
