//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded
    ConfigLoaded,

    // External tools
    /// Full command line rendered (password redacted)
    CommandRendered,
    /// External process finished with rc 0
    CommandExecuted,
    /// External process finished with a non-zero rc
    CommandFailed,

    // Idempotence
    /// Observed state already matches the desired state
    StateSatisfied,
    /// A mutating command was issued
    StateChanged,
    /// Check mode suppressed a mutating command
    CheckModeSkipped,

    // Polling
    /// One poll attempt ran
    PollAttempt,
    /// The polled condition was reached
    PollConverged,
    /// Attempts ran out before convergence
    PollExhausted,

    // CQL
    /// A driver session was opened
    CqlConnected,
    /// A CQL statement was sent to the cluster
    CqlExecuted,
    /// A CQL statement failed
    CqlFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::CommandRendered => "COMMAND_RENDERED",
            Event::CommandExecuted => "COMMAND_EXECUTED",
            Event::CommandFailed => "COMMAND_FAILED",

            Event::StateSatisfied => "STATE_SATISFIED",
            Event::StateChanged => "STATE_CHANGED",
            Event::CheckModeSkipped => "CHECK_MODE_SKIPPED",

            Event::PollAttempt => "POLL_ATTEMPT",
            Event::PollConverged => "POLL_CONVERGED",
            Event::PollExhausted => "POLL_EXHAUSTED",

            Event::CqlConnected => "CQL_CONNECTED",
            Event::CqlExecuted => "CQL_EXECUTED",
            Event::CqlFailed => "CQL_FAILED",
        }
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::CommandFailed | Event::PollExhausted | Event::CqlFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
